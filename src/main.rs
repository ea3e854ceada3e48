use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use std::io::Read;
use std::path::PathBuf;
use tasklist::config::{Backend, Language, Settings};
use tasklist::{Filter, ImportOutcome, Priority, SortOption, Task, TaskStore, import_text};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tasks")]
#[command(about = "Personal task list with an importer for pasted checklists and AI transcripts")]
#[command(version)]
struct Cli {
    /// Directory holding task data (default: from settings)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Storage backend (default: from settings)
    #[arg(short, long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Settings file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        text: Vec<String>,

        /// Longer description
        #[arg(short = 'D', long)]
        description: Option<String>,
    },

    /// List visible tasks
    List {
        #[arg(short, long, value_enum, default_value_t = Filter::All)]
        filter: Filter,

        #[arg(short, long, value_enum)]
        sort: Option<SortOption>,

        /// Case-insensitive text search
        #[arg(short = 'q', long)]
        search: Option<String>,

        /// List to show
        #[arg(short, long, default_value = tasklist::DEFAULT_LIST_ID)]
        list: String,
    },

    /// Toggle completion
    Done { task: String },

    /// Delete a task
    Delete { task: String },

    /// Replace a task's text
    Edit { task: String, text: Vec<String> },

    /// Set priority (none, low, medium, high)
    Priority { task: String, level: Priority },

    /// Add a tag, or remove it with --remove
    Tag {
        task: String,
        tag: String,

        #[arg(short, long)]
        remove: bool,
    },

    /// Manage a task's checklist
    Step {
        #[command(subcommand)]
        command: StepCommand,
    },

    /// Set the due date (YYYY-MM-DD or RFC 3339)
    Due {
        task: String,
        date: Option<String>,

        #[arg(long, conflicts_with = "date")]
        clear: bool,
    },

    /// Set a reminder (YYYY-MM-DD or RFC 3339)
    Remind {
        task: String,
        at: Option<String>,

        #[arg(long, conflicts_with = "at")]
        clear: bool,
    },

    /// Toggle membership in My Day
    MyDay { task: String },

    /// Move a task to another list
    Move { task: String, list: String },

    /// Extract tasks from a file, or stdin when no file is given
    Import { file: Option<PathBuf> },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum StepCommand {
    /// Append a step
    Add { task: String, text: Vec<String> },

    /// Toggle a step by its 1-based number
    Toggle { task: String, step: usize },

    /// Delete a step by its 1-based number
    Delete { task: String, step: usize },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };
    let mut settings = Settings::load_from(&settings_path)?;

    if let Commands::Config { command } = cli.command {
        return run_config(command, &mut settings, &settings_path);
    }

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => settings.data_dir()?,
    };
    let backend = cli.backend.unwrap_or(settings.backend);
    let storage = backend.open(&data_dir).wrap_err("Failed to open task storage")?;

    let mut store = TaskStore::new(storage)
        .with_debounce(settings.debounce())
        .with_sort_option(settings.default_sort);
    store.load().await.wrap_err("Failed to load tasks")?;

    let changed = run(&mut store, cli.command, settings.language)?;
    if changed {
        store.flush().await.wrap_err("Failed to save tasks")?;
    }

    Ok(())
}

fn run_config(command: ConfigCommand, settings: &mut Settings, path: &std::path::Path) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("{}", path.display().to_string().dimmed());
            print!("{}", serde_yaml::to_string(settings)?);
        }
        ConfigCommand::Set { key, value } => {
            settings.set(&key, &value)?;
            settings.save_to(path)?;
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

/// Run one command against a loaded store. Returns whether tasks changed.
fn run(store: &mut TaskStore, command: Commands, lang: Language) -> Result<bool> {
    let changed = match command {
        Commands::Add { text, description } => {
            let mut new_task = tasklist::NewTask::new(text.join(" "));
            new_task.description = description;
            match store.add_task(new_task) {
                Some(_) => {
                    println!("{}", message(lang, Message::Added).green());
                    true
                }
                None => return Err(eyre!("Task text cannot be empty")),
            }
        }
        Commands::List {
            filter,
            sort,
            search,
            list,
        } => {
            store.set_selected_list(&list);
            store.set_filter(filter);
            if let Some(sort) = sort {
                store.set_sort_option(sort);
            }
            if let Some(term) = search {
                store.set_search_term(&term);
            }
            print_tasks(store, lang);
            false
        }
        Commands::Done { task } => {
            let id = resolve(store, &task)?;
            store.toggle_completion(&id)
        }
        Commands::Delete { task } => {
            let id = resolve(store, &task)?;
            let deleted = store.delete_task(&id);
            if deleted {
                println!("{}", message(lang, Message::Deleted));
            }
            deleted
        }
        Commands::Edit { task, text } => {
            let id = resolve(store, &task)?;
            let updated = store.update_task_text(&id, &text.join(" "));
            if updated {
                println!("{}", message(lang, Message::Updated));
            }
            updated
        }
        Commands::Priority { task, level } => {
            let id = resolve(store, &task)?;
            store.set_priority(&id, level)
        }
        Commands::Tag { task, tag, remove } => {
            let id = resolve(store, &task)?;
            if remove {
                store.remove_tag(&id, &tag)
            } else {
                store.add_tag(&id, &tag)
            }
        }
        Commands::Step { command } => run_step(store, command)?,
        Commands::Due { task, date, clear } => {
            let id = resolve(store, &task)?;
            let due = when(date, clear)?;
            store.set_due_date(&id, due)
        }
        Commands::Remind { task, at, clear } => {
            let id = resolve(store, &task)?;
            let reminder = when(at, clear)?;
            store.set_reminder(&id, reminder)
        }
        Commands::MyDay { task } => {
            let id = resolve(store, &task)?;
            store.toggle_my_day(&id)
        }
        Commands::Move { task, list } => {
            let id = resolve(store, &task)?;
            store.move_to_list(&id, &list)
        }
        Commands::Import { file } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
                    buf
                }
            };
            let outcome = import_text(store, &text);
            println!("{}", message(lang, Message::Import(outcome)));
            matches!(outcome, ImportOutcome::Imported(_))
        }
        Commands::Config { .. } => false,
    };
    Ok(changed)
}

fn run_step(store: &mut TaskStore, command: StepCommand) -> Result<bool> {
    match command {
        StepCommand::Add { task, text } => {
            let id = resolve(store, &task)?;
            Ok(store.add_step(&id, &text.join(" ")).is_some())
        }
        StepCommand::Toggle { task, step } => {
            let id = resolve(store, &task)?;
            let step_id = resolve_step(store, &id, step)?;
            Ok(store.toggle_step(&id, &step_id))
        }
        StepCommand::Delete { task, step } => {
            let id = resolve(store, &task)?;
            let step_id = resolve_step(store, &id, step)?;
            Ok(store.delete_step(&id, &step_id))
        }
    }
}

/// A task reference is its 1-based position in stored order, or an id prefix
fn resolve(store: &TaskStore, reference: &str) -> Result<String> {
    let tasks = store.tasks();
    if let Ok(n) = reference.parse::<usize>()
        && (1..=tasks.len()).contains(&n)
    {
        return Ok(tasks[n - 1].id.clone());
    }

    let matches: Vec<&Task> = tasks.iter().filter(|t| t.id.starts_with(reference)).collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => Err(eyre!("No task matches '{}'", reference)),
        _ => Err(eyre!("'{}' matches {} tasks, use a longer id", reference, matches.len())),
    }
}

fn resolve_step(store: &TaskStore, task_id: &str, number: usize) -> Result<String> {
    store
        .task(task_id)
        .and_then(|t| number.checked_sub(1).and_then(|i| t.steps.get(i)))
        .map(|s| s.id.clone())
        .ok_or_else(|| eyre!("No step {} on that task", number))
}

fn when(value: Option<String>, clear: bool) -> Result<Option<DateTime<Utc>>> {
    if clear {
        return Ok(None);
    }
    let value = value.ok_or_else(|| eyre!("Give a date or --clear"))?;
    if let Ok(at) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| eyre!("Invalid date '{}'", value))?;
    Ok(Some(midnight.and_utc()))
}

fn print_tasks(store: &TaskStore, lang: Language) {
    let visible = store.visible_tasks();
    if visible.is_empty() {
        println!("{}", message(lang, Message::Empty).dimmed());
        return;
    }

    for task in &visible {
        let number = store
            .tasks()
            .iter()
            .position(|t| t.id == task.id)
            .map_or(0, |i| i + 1);
        let check = if task.completed { "[x]" } else { "[ ]" };
        let text = if task.completed {
            task.text.dimmed().strikethrough()
        } else {
            task.text.normal()
        };

        let mut line = format!("{:>3} {} {}", number, check, text);
        match task.priority {
            Priority::High => line.push_str(&format!(" {}", "!high".red().bold())),
            Priority::Medium => line.push_str(&format!(" {}", "!medium".yellow())),
            Priority::Low => line.push_str(&format!(" {}", "!low".blue())),
            Priority::None => {}
        }
        if task.my_day {
            line.push_str(&format!(" {}", "☀".yellow()));
        }
        if let Some(due) = task.due_date {
            line.push_str(&format!(" {}", format!("due {}", due.format("%Y-%m-%d")).cyan()));
        }
        for tag in &task.tags {
            line.push_str(&format!(" {}", format!("#{}", tag).magenta()));
        }
        if !task.steps.is_empty() {
            let done = task.steps.iter().filter(|s| s.completed).count();
            line.push_str(&format!(" {}", format!("({}/{})", done, task.steps.len()).dimmed()));
        }
        println!("{}", line);

        for (i, step) in task.steps.iter().enumerate() {
            let mark = if step.completed { "[x]" } else { "[ ]" };
            println!("      {}.{} {}", i + 1, mark, step.text);
        }
    }
}

enum Message {
    Added,
    Deleted,
    Updated,
    Empty,
    Import(ImportOutcome),
}

fn message(lang: Language, msg: Message) -> String {
    match (lang, msg) {
        (Language::En, Message::Import(outcome)) => outcome.to_string(),
        (Language::En, Message::Added) => "Todo added successfully!".to_string(),
        (Language::En, Message::Deleted) => "Todo deleted.".to_string(),
        (Language::En, Message::Updated) => "Todo updated.".to_string(),
        (Language::En, Message::Empty) => "No todos found. Try a different filter or create a new one!".to_string(),
        (Language::Ko, Message::Import(ImportOutcome::Imported(n))) => format!("{}개의 할 일을 가져왔습니다!", n),
        (Language::Ko, Message::Import(ImportOutcome::NoTasksFound)) => "텍스트에서 할 일을 찾을 수 없습니다.".to_string(),
        (Language::Ko, Message::Import(ImportOutcome::EmptyInput)) => "먼저 텍스트를 붙여넣어 주세요.".to_string(),
        (Language::Ko, Message::Added) => "할 일이 추가되었습니다!".to_string(),
        (Language::Ko, Message::Deleted) => "할 일이 삭제되었습니다.".to_string(),
        (Language::Ko, Message::Updated) => "할 일이 수정되었습니다.".to_string(),
        (Language::Ko, Message::Empty) => "할 일이 없습니다. 필터를 변경하거나 새로 만들어보세요!".to_string(),
    }
}
