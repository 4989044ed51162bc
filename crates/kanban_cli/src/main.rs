//! Terminal front end for the kanban board.
//!
//! # Responsibility
//! - Parse one command per invocation and run it against a freshly loaded board.
//! - Map usage problems to exit code 2 and operation failures to exit code 1.

use kanban_core::{
    core_version, default_log_level, init_logging, BackendKind, BoardConfig, MoveOutcome,
    NoteBackend, NoteBoard, NoteId, NoteStatus,
};
use log::{info, warn};
use std::error::Error;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Add { title: String, content: String },
    Edit { id: NoteId, title: String, content: String },
    Remove { id: NoteId },
    Move { id: NoteId, status: NoteStatus },
    Render,
    Version,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::Remove { .. } => "rm",
            Self::Move { .. } => "mv",
            Self::Render => "render",
            Self::Version => "version",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    command: Command,
    db: Option<String>,
    api: Option<String>,
}

fn usage() -> &'static str {
    "kanban - three-column note board\n\n\
USAGE:\n\
  kanban [--db PATH | --api URL] <COMMAND>\n\n\
COMMANDS:\n\
  list                         show every column\n\
  add <title> [content]        create a note in todo\n\
  edit <id> <title> [content]  replace title and content\n\
  rm <id>                      delete a note\n\
  mv <id> <todo|doing|complete>\n\
  render                       print the board as HTML\n\
  version\n\n\
NOTES:\n\
  - Settings come from KANBAN_* variables (a .env file is read if present).\n\
  - `--db` forces the local store, `--api` the remote notes API.\n"
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut db = None;
    let mut api = None;
    let mut positional = Vec::new();

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--db" => {
                i += 1;
                db = Some(args.get(i).ok_or("--db requires PATH")?.clone());
            }
            "--api" => {
                i += 1;
                api = Some(args.get(i).ok_or("--api requires URL")?.clone());
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag: {flag}")),
            value => positional.push(value.to_string()),
        }
        i += 1;
    }
    if db.is_some() && api.is_some() {
        return Err("--db and --api cannot be combined".to_string());
    }

    let command = parse_command(&positional)?;
    Ok(CliArgs { command, db, api })
}

fn parse_command(positional: &[String]) -> Result<Command, String> {
    let Some((name, rest)) = positional.split_first() else {
        return Err("missing command".to_string());
    };
    let arg = |index: usize, what: &str| -> Result<String, String> {
        rest.get(index)
            .cloned()
            .ok_or_else(|| format!("{name} requires {what}"))
    };
    let optional = |index: usize| rest.get(index).cloned().unwrap_or_default();

    let (command, max_args) = match name.as_str() {
        "list" => (Command::List, 0),
        "render" => (Command::Render, 0),
        "version" => (Command::Version, 0),
        "add" => (
            Command::Add {
                title: arg(0, "<title>")?,
                content: optional(1),
            },
            2,
        ),
        "edit" => (
            Command::Edit {
                id: NoteId::new(arg(0, "<id>")?),
                title: arg(1, "<title>")?,
                content: optional(2),
            },
            3,
        ),
        "rm" => (
            Command::Remove {
                id: NoteId::new(arg(0, "<id>")?),
            },
            1,
        ),
        "mv" => {
            let id = NoteId::new(arg(0, "<id>")?);
            let raw = arg(1, "<status>")?;
            let status = NoteStatus::parse(&raw)
                .ok_or_else(|| format!("unknown status `{raw}`; expected todo|doing|complete"))?;
            (Command::Move { id, status }, 2)
        }
        other => return Err(format!("unknown command: {other}")),
    };
    if rest.len() > max_args {
        return Err(format!("too many arguments for {name}"));
    }
    Ok(command)
}

fn resolve_config(cli: &CliArgs) -> Result<BoardConfig, String> {
    let mut config = BoardConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(path) = &cli.db {
        config.backend = BackendKind::Local;
        config.db_path = path.clone();
    }
    if let Some(url) = &cli.api {
        config.backend = BackendKind::Remote;
        config.api_url = Some(url.clone());
    }
    config.validated().map_err(|err| err.to_string())
}

fn start_logging(config: &BoardConfig) {
    let Some(log_dir) = config.log_dir.as_deref() else {
        return;
    };
    let level = config.log_level.as_deref().unwrap_or(default_log_level());
    if let Err(err) = init_logging(level, log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}

async fn run(config: &BoardConfig, command: Command) -> Result<(), Box<dyn Error>> {
    let backend: Arc<dyn NoteBackend> = config.open_backend()?;
    let board = NoteBoard::new(backend);
    board.load().await?;

    match command {
        Command::List => print_columns(&board),
        Command::Render => print!("{}", board.render_html()),
        Command::Add { title, content } => {
            let note = board.create(&title, &content).await?;
            println!("created {}", note.id);
        }
        Command::Edit { id, title, content } => {
            board.update(&id, &title, &content).await?;
            println!("updated {id}");
        }
        Command::Remove { id } => {
            board.remove(&id).await?;
            println!("removed {id}");
        }
        Command::Move { id, status } => match board.move_status(&id, status).await? {
            MoveOutcome::Moved => println!("moved {id} to {status}"),
            MoveOutcome::Unchanged => println!("{id} is already in {status}"),
            MoveOutcome::Busy => println!("{id} has a move in flight"),
        },
        Command::Version => println!("kanban {}", core_version()),
    }
    Ok(())
}

fn print_columns<B: NoteBackend>(board: &NoteBoard<B>) {
    let view = board.view();
    for column in view.columns() {
        println!("{} ({})", column.status().label(), column.count());
        if column.shows_placeholder() {
            println!("  -");
        }
        for card in column.cards() {
            println!("  [{}] {}", card.id, card.title);
            if !card.content.is_empty() {
                println!("      {}", card.content.replace('\n', "\n      "));
            }
        }
    }
}

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print!("{}", usage());
        return;
    }

    let cli = parse_args(&args).unwrap_or_else(|err| {
        eprintln!("{err}\n\n{}", usage());
        std::process::exit(2);
    });
    if cli.command == Command::Version {
        println!("kanban {}", core_version());
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("warning: ignoring .env: {err}");
        }
    }
    let config = resolve_config(&cli).unwrap_or_else(|err| {
        eprintln!("{err}");
        std::process::exit(2);
    });
    start_logging(&config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|err| {
            eprintln!("failed to start runtime: {err}");
            std::process::exit(1);
        });

    let name = cli.command.name();
    info!("event=cli_command module=cli status=start command={name}");
    if let Err(err) = runtime.block_on(run(&config, cli.command)) {
        warn!("event=cli_command module=cli status=error command={name}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    info!("event=cli_command module=cli status=ok command={name}");
}
