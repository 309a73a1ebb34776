use clap::{Parser, Subcommand};
use dbchat::api::{AuthClient, ChatClient};
use dbchat::catalog::Catalog;
use dbchat::conversation::{ChatBackend, Conversation};
use dbchat::history::{self, HistorySidebar};
use dbchat::models::{LoginCredentials, Message, ModelType, RegisterData, Role};
use dbchat::render::{format_timestamp, render_message};
use dbchat::routing::{resolve, Navigator, Route};
use dbchat::session::SessionStore;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dbchat")]
#[command(about = "Chat with your database", long_about = None)]
struct Cli {
    /// Config file path (default: DBCHAT_CONFIG_PATH or ~/.dbchat/config.json)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Sign in and store the session.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign in.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Chat interactively. Commands: /new, /model NAME, /exit, /quit.
    Chat {
        /// Continue a saved chat.
        #[arg(long, value_name = "ID")]
        id: Option<String>,

        /// sqlCoder, gemini, openAI, rag, langchain or agent (default from config).
        #[arg(long, short)]
        model: Option<ModelType>,
    },

    /// List saved chats, newest as the server orders them.
    History {
        /// Mark this chat as the one in view.
        #[arg(long, value_name = "ID")]
        current: Option<String>,
    },

    /// Delete a saved chat.
    Delete { id: String },

    /// Browse standard queries; --run N asks the N-th listed query in a new chat.
    Queries {
        #[arg(long, short)]
        search: Option<String>,

        #[arg(long, value_name = "N")]
        run: Option<usize>,

        #[arg(long, short)]
        model: Option<ModelType>,
    },
}

/// Everything a command needs, built from config.
struct Context {
    session: SessionStore,
    auth: AuthClient,
    chat: ChatClient,
    default_model: ModelType,
}

impl Context {
    fn load(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let (config, path) = dbchat::config::load_config(config_path)?;
        let base_url = dbchat::config::resolve_api_base_url(&config);
        let session_path = dbchat::config::resolve_session_path(&config, &path);
        log::debug!("api {} session {}", base_url, session_path.display());
        Ok(Self {
            session: SessionStore::file(session_path),
            auth: AuthClient::new(Some(base_url.clone())),
            chat: ChatClient::new(Some(base_url)),
            default_model: dbchat::config::resolve_default_model(&config),
        })
    }

    /// Apply the route guard; private commands fail when nobody is signed in.
    fn guard(&self, route: Route) -> anyhow::Result<Route> {
        match resolve(route, self.session.has_session()) {
            Route::Login => anyhow::bail!("not signed in; run `dbchat login --email ...` first"),
            landed => Ok(landed),
        }
    }

    fn user_id(&self) -> anyhow::Result<String> {
        self.session
            .current_user_id()
            .ok_or_else(|| anyhow::anyhow!("stored user has no id; sign in again"))
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Run with --help for usage");
        return;
    };
    if let Commands::Version = command {
        println!("dbchat {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    if let Err(e) = run(cli.config, command).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Option<PathBuf>, command: Commands) -> anyhow::Result<()> {
    let ctx = Context::load(config)?;
    match command {
        Commands::Version => Ok(()),
        Commands::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let res = ctx
                .session
                .login(&ctx.auth, &LoginCredentials { email, password })
                .await?;
            println!("signed in as {} <{}>", res.user.username, res.user.email);
            Ok(())
        }
        Commands::Register {
            email,
            username,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let data = RegisterData {
                email,
                password,
                username,
            };
            let res = ctx.session.register(&ctx.auth, &data).await?;
            println!("registered {} <{}>", res.user.username, res.user.email);
            Ok(())
        }
        Commands::Logout => {
            ctx.session.logout()?;
            println!("signed out");
            Ok(())
        }
        Commands::Whoami => {
            match ctx.session.current_user() {
                Some(u) => {
                    println!("{} <{}> id={}", u.username, u.email, u.id);
                    if !ctx.session.is_authenticated() {
                        println!("(no token stored)");
                    }
                }
                None => println!("not signed in"),
            }
            Ok(())
        }
        Commands::Chat { id, model } => {
            let route = ctx.guard(Route::Chat(id))?;
            let nav = Navigator::new(route, true);
            run_chat(&ctx, nav, model.unwrap_or(ctx.default_model)).await
        }
        Commands::History { current } => {
            let route = ctx.guard(Route::Chat(current))?;
            run_history(&ctx, &route).await
        }
        Commands::Delete { id } => {
            let route = ctx.guard(Route::Chat(None))?;
            let mut nav = Navigator::new(route, true);
            let mut sidebar = HistorySidebar::new();
            if !sidebar.delete(&ctx.chat, &id, &mut nav).await {
                anyhow::bail!("could not delete chat {}", id);
            }
            println!("deleted {}", id);
            Ok(())
        }
        Commands::Queries { search, run, model } => {
            ctx.guard(Route::StandardQueries)?;
            let term = search.unwrap_or_default();
            let catalog = Catalog::standard();
            match run {
                None => {
                    print_catalog(&catalog, &term);
                    Ok(())
                }
                Some(n) => {
                    let flat = catalog.flat(&term);
                    let (_, query) = n
                        .checked_sub(1)
                        .and_then(|i| flat.get(i))
                        .ok_or_else(|| anyhow::anyhow!("no query #{} (have {})", n, flat.len()))?;
                    let mut nav = Navigator::new(Route::StandardQueries, true);
                    nav.navigate_with_query(*query, ctx.session.has_session());
                    run_chat(&ctx, nav, model.unwrap_or(ctx.default_model)).await
                }
            }
        }
    }
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let p = line.trim_end_matches(['\r', '\n']).to_string();
    if p.is_empty() {
        anyhow::bail!("password is required");
    }
    Ok(p)
}

fn print_catalog(catalog: &Catalog, term: &str) {
    let groups = catalog.filter(term);
    if groups.is_empty() {
        println!("No queries match {:?}.", term);
        return;
    }
    let mut n = 0;
    for group in groups {
        println!("{} ({})", group.category, group.count_label());
        for q in &group.queries {
            n += 1;
            println!("  {:>2}. {}", n, q);
        }
    }
}

async fn run_history(ctx: &Context, route: &Route) -> anyhow::Result<()> {
    let user_id = ctx.user_id()?;
    let mut sidebar = HistorySidebar::new();
    if !sidebar.refresh(&ctx.chat, &user_id).await {
        anyhow::bail!("could not load chat history");
    }
    if sidebar.is_empty() {
        println!("No saved chats.");
    }
    for item in sidebar.items() {
        let mark = if history::is_active(item, route) { "*" } else { " " };
        let when = item
            .updated_at
            .as_deref()
            .or(item.created_at.as_deref())
            .map(format_timestamp)
            .unwrap_or_default();
        println!("{} {}  {}  {}", mark, item.id, when, item.title);
    }
    Ok(())
}

fn print_message(m: &Message) {
    match m.role {
        Role::User => println!("> {}", m.content),
        Role::Assistant => println!("< {}\n", render_message(m).replace('\n', "\n  ")),
    }
}

async fn run_chat(ctx: &Context, mut nav: Navigator, mut model: ModelType) -> anyhow::Result<()> {
    let backend: Arc<dyn ChatBackend> = Arc::new(ctx.chat.clone());
    let user_id = ctx.session.current_user_id();
    let mut convo = Conversation::open(backend, user_id, nav.current().chat_id()).await;
    for m in convo.messages() {
        print_message(m);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut pending = nav.take_pending_query();

    loop {
        let input = match pending.take() {
            Some(q) => {
                println!("> {}", q);
                q
            }
            None => {
                write!(stdout, "[{}] > ", model)?;
                stdout.flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                line.trim().to_string()
            }
        };
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/new") {
            convo.reset();
            nav.go(Route::Chat(None), true);
            for m in convo.messages() {
                print_message(m);
            }
            continue;
        }
        if let Some(name) = input.strip_prefix("/model") {
            match name.trim().parse::<ModelType>() {
                Ok(m) => {
                    model = m;
                    println!("model: {}", m.label());
                }
                Err(e) => eprintln!("{}", e),
            }
            continue;
        }

        let Some(outcome) = convo.send(&input, model).await else {
            continue;
        };
        print_message(&outcome.reply);
        if let Some(id) = outcome.created_chat_id() {
            nav.replace(Route::Chat(Some(id.to_string())));
            println!("(saved as chat {})", id);
        }
    }

    Ok(())
}
