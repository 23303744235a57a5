//! Todo Sync command line entry point

use clap::{Parser, Subcommand};
use todo_sync::session::Route;
use todo_sync::theme::Theme;
use todo_sync::{AppResult, AuthError, ClientConfig, TodoApp};

#[derive(Parser)]
#[command(name = "todo-sync", about = "Manage todos on a PocketBase backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session
    Login { email: String, password: String },
    /// Forget the stored session
    Logout,
    /// Show all todos
    List,
    /// Add a todo
    Add {
        title: String,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Toggle completion
    Toggle { id: String },
    /// Delete a todo
    Delete { id: String },
    /// Show assignee candidates
    Assignees,
    /// Show or set the theme
    Theme { theme: Option<Theme> },
}

impl Command {
    /// Commands that work on the todo list of a live session
    fn needs_session(&self) -> bool {
        matches!(
            self,
            Command::List | Command::Add { .. } | Command::Toggle { .. } | Command::Delete { .. }
        )
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (config, report) = match ClientConfig::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = rolling_logger::init_logger(&config.log_dir, "TodoSync") {
        eprintln!("Logging disabled: {}", e);
    }
    report.log();

    if let Err(e) = run(cli.command, &config).await {
        let _ = rolling_logger::error(&e.to_string());
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: &ClientConfig) -> AppResult<()> {
    let app = TodoApp::from_config(config)?;
    if command.needs_session() {
        app.start().await?;
        app.session()
            .guard(Route::Home)
            .map_err(|_| AuthError::NotLoggedIn)?;
    }

    match command {
        Command::Login { email, password } => {
            let user = app.login(&email, &password).await?;
            println!("Welcome {}", if user.name.is_empty() { &user.email } else { &user.name });
        }
        Command::Logout => app.logout()?,
        Command::List => print_todos(&app),
        Command::Add { title, assignee } => {
            if assignee.is_some() {
                app.load_assignees().await?;
            }
            let todo = app.add_todo(&title, assignee.as_deref()).await?;
            println!("Created {}", todo.id);
            print_todos(&app);
        }
        Command::Toggle { id } => {
            app.toggle(&id).await?;
            print_todos(&app);
        }
        Command::Delete { id } => {
            app.delete(&id).await?;
            print_todos(&app);
        }
        Command::Assignees => {
            for candidate in app.load_assignees().await? {
                println!("{}\t{}", candidate.name, candidate.avatar);
            }
        }
        Command::Theme { theme } => {
            if let Some(theme) = theme {
                app.theme().set_theme(theme)?;
            }
            println!("{}", app.theme().theme());
        }
    }
    Ok(())
}

fn print_todos(app: &TodoApp) {
    for todo in app.todos() {
        let mark = if todo.completed { "x" } else { " " };
        if todo.has_assignee() {
            println!("[{}] {}  {} ({})", mark, todo.id, todo.title, todo.assignee_name);
        } else {
            println!("[{}] {}  {}", mark, todo.id, todo.title);
        }
    }
}
