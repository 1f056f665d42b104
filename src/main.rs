#![forbid(unsafe_code)]

mod config;
mod constants;
mod document;
mod format;
mod ipc;
mod resolver;
mod shell;
mod storage;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::{debug, info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::{PreferenceStore, Theme};
use document::{Document, DocumentManager, InvalidValue, MappedFolder, Setting, Toggle};
use format::WsbFormat;
use ipc::{BridgeClient, BridgeHost};
use resolver::{HostFilesystem, PathResolver};
use shell::{FileOperations, MenuAction, Status};
use storage::{ConsoleDialogs, DiskStorage, PresetDialogs};

#[derive(Parser, Debug)]
#[command(name = "wsb-editor", version, about = "Edit Windows Sandbox (.wsb) configuration files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an empty configuration, or write it to a file
    New {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the settings of a file and its normalized form
    Show {
        /// Asked for on the console when omitted
        path: Option<PathBuf>,
    },

    /// Change settings in a file and save it
    Edit(EditArgs),

    /// Directory completions for a partially typed path
    Complete {
        #[arg(default_value = "")]
        input: String,

        /// Document whose folder is offered when nothing is typed
        #[arg(long)]
        current: Option<PathBuf>,
    },

    /// Show or change the colour theme
    Theme {
        theme: Option<Theme>,

        /// Resolve `system` as a dark desktop would
        #[arg(long)]
        prefers_dark: bool,
    },

    /// Answer bridge requests framed as length-prefixed JSON on stdin/stdout
    Serve,
}

#[derive(Args, Debug)]
struct EditArgs {
    path: PathBuf,

    /// Toggle assignment, e.g. Networking=Disable (repeatable)
    #[arg(long = "set", value_name = "SETTING=VALUE", value_parser = parse_assignment)]
    set: Vec<(Setting, Toggle)>,

    /// Memory limit in MB; 0 removes it
    #[arg(long)]
    memory: Option<u32>,

    /// Add a mapped folder: HOST[=SANDBOX][;ro|;rw] (repeatable)
    #[arg(long = "map", value_name = "FOLDER")]
    map: Vec<MappedFolder>,

    /// Remove existing mapped folders before adding new ones
    #[arg(long)]
    clear_maps: bool,

    /// Logon command; an empty string removes it
    #[arg(long)]
    logon: Option<String>,

    /// Write here instead of overwriting PATH
    #[arg(short, long, conflicts_with = "save_as")]
    output: Option<PathBuf>,

    /// Ask for the destination on the console
    #[arg(long)]
    save_as: bool,
}

fn parse_assignment(arg: &str) -> Result<(Setting, Toggle), InvalidValue> {
    let (setting, value) = arg.split_once('=').ok_or_else(|| InvalidValue {
        kind: "assignment",
        value: arg.to_string(),
    })?;
    Ok((setting.parse()?, value.parse()?))
}

impl EditArgs {
    fn apply(&self, doc: &mut Document) {
        for &(setting, value) in &self.set {
            doc.set_toggle(setting, value);
        }
        if let Some(memory) = self.memory {
            doc.set_memory_mb(memory);
        }
        if self.clear_maps {
            doc.mapped_folders.clear();
        }
        doc.mapped_folders.extend(self.map.iter().cloned());
        if let Some(logon) = &self.logon {
            doc.logon_command = logon.clone();
        }
    }
}

fn init_logging() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    // stdout carries documents and frames
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")?;
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.command {
        Command::Serve => serve(&runtime),
        command => runtime.block_on(run_console(command)),
    }
}

/// Console commands drive the editor through the bridge like the window does
async fn run_console(command: Command) -> Result<()> {
    let (client, host) = ipc::channel(
        DiskStorage::new(ConsoleDialogs),
        PathResolver::new(HostFilesystem),
        PreferenceStore::load(),
    );

    let session = async {
        let result = async {
            client.ping().await.context("Bridge host did not answer")?;
            console_session(&client, command).await
        }
        .await;
        if let Err(e) = client.shutdown().await {
            warn!(error = %e, "bridge host already stopped");
        }
        result
    };
    let (result, host) = tokio::join!(session, host.run());
    debug!(title = host.title(), "console session finished");
    result
}

async fn console_session(client: &BridgeClient, command: Command) -> Result<()> {
    let mut ops = FileOperations::new(DocumentManager::new(WsbFormat, client.clone()));
    match command {
        Command::New { output } => {
            ops.handle_menu(MenuAction::New).await;
            match output {
                Some(path) => {
                    ops.save(Some(path)).await;
                    finish(ops.take_status())
                }
                None => {
                    print!("{}", ops.manager().serialize_stripped());
                    Ok(())
                }
            }
        }
        Command::Show { path } => {
            match path {
                Some(path) => ops.open_path(&path).await,
                None => ops.handle_menu(MenuAction::Open).await,
            }
            finish(ops.take_status())?;
            print_summary(ops.manager());
            Ok(())
        }
        Command::Edit(args) => edit_session(&mut ops, &args).await,
        Command::Complete { input, current } => {
            for candidate in client.search_directories(&input, current.as_deref()).await {
                println!("{candidate}");
            }
            Ok(())
        }
        Command::Theme {
            theme,
            prefers_dark,
        } => {
            if let Some(theme) = theme {
                client.set_theme(theme).await?;
                info!(theme = %theme, "theme saved");
            }
            let theme = client.theme().await?;
            match theme {
                Theme::System => println!("{theme} ({})", theme.effective(prefers_dark)),
                _ => println!("{theme}"),
            }
            Ok(())
        }
        Command::Serve => bail!("serve is not a console command"),
    }
}

/// Turn an error or a cancelled request into a failure, print the rest
fn finish(status: Option<Status>) -> Result<()> {
    match status {
        Some(Status::Success(message)) => {
            eprintln!("{message}");
            Ok(())
        }
        Some(Status::Error(message)) => bail!("{message}"),
        None => bail!("cancelled"),
    }
}

fn print_summary(manager: &DocumentManager<WsbFormat, BridgeClient>) {
    let doc = manager.document();
    if let Some(path) = manager.current_path() {
        println!("File: {}", path.display());
    }
    for setting in Setting::ALL {
        println!("  {:<22} {}", setting.element_name(), doc.toggle(setting));
    }
    match doc.memory_mb {
        Some(mb) => println!("  {:<22} {mb} MB", "MemoryInMB"),
        None => println!("  {:<22} Default", "MemoryInMB"),
    }
    for folder in &doc.mapped_folders {
        let sandbox = folder.sandbox_folder.as_deref().unwrap_or("(default)");
        let mode = match folder.read_only {
            Some(true) => "read-only",
            Some(false) => "read-write",
            None => "default access",
        };
        println!("  MappedFolder           {} -> {sandbox} ({mode})", folder.host_folder);
    }
    if !doc.logon_command.is_empty() {
        println!("  {:<22} {}", "LogonCommand", doc.logon_command);
    }
    println!();
    print!("{}", manager.serialize_stripped());
}

async fn edit_session(ops: &mut FileOperations<WsbFormat>, args: &EditArgs) -> Result<()> {
    ops.handle_drop(&args.path).await;
    if let Some(Status::Error(message)) = ops.take_status() {
        bail!("{message}");
    }

    args.apply(ops.manager_mut().document_mut());
    if !ops.manager().is_modified() && args.output.is_none() && !args.save_as {
        eprintln!("No changes to {}", args.path.display());
        return Ok(());
    }

    if args.save_as {
        ops.handle_menu(MenuAction::SaveAs).await;
    } else {
        ops.save(args.output.clone()).await;
        ops.sync_title().await;
    }
    let status = ops.take_status();

    // A cancelled or failed save leaves changes behind; offer one more destination
    if !ops.request_close().await {
        ops.handle_menu(MenuAction::SaveAs).await;
        if ops.manager().is_modified() {
            bail!("Changes to {} were not saved", args.path.display());
        }
        return finish(ops.take_status());
    }
    finish(status)
}

/// The relay thread owns stdin/stdout; the host runs on this thread
fn serve(runtime: &tokio::runtime::Runtime) -> Result<()> {
    let (client, host): (BridgeClient, BridgeHost<PresetDialogs>) = ipc::channel(
        DiskStorage::new(PresetDialogs::new()),
        PathResolver::new(HostFilesystem),
        PreferenceStore::load(),
    );

    let relay = std::thread::spawn(move || {
        ipc::serve_frames(&client, io::stdin().lock(), io::stdout().lock())
    });
    let host = runtime.block_on(host.run());
    debug!(title = host.title(), "bridge served its last request");

    relay
        .join()
        .map_err(|_| anyhow!("frame relay thread panicked"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::DialogAnswer;
    use std::fs;

    fn edit_args(argv: &[&str]) -> EditArgs {
        let cli = Cli::try_parse_from(["wsb-editor", "edit"].into_iter().chain(argv.iter().copied())).unwrap();
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        args
    }

    fn preset_bridge() -> (BridgeClient, BridgeHost<PresetDialogs>) {
        ipc::channel(
            DiskStorage::new(PresetDialogs::new()),
            PathResolver::new(HostFilesystem),
            PreferenceStore::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_edit_session_writes_output_and_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lab.wsb");
        let output = dir.path().join("lab-copy.wsb");
        fs::write(&source, "<Configuration><Networking>Disable</Networking></Configuration>").unwrap();
        let args = edit_args(&[
            source.to_str().unwrap(),
            "--set",
            "VGpu=Enable",
            "--output",
            output.to_str().unwrap(),
        ]);

        let (client, host) = preset_bridge();
        let mut ops = FileOperations::new(DocumentManager::new(WsbFormat, client.clone()));
        let (result, host) = tokio::join!(
            async {
                let result = edit_session(&mut ops, &args).await;
                client.shutdown().await.unwrap();
                result
            },
            host.run()
        );
        result.unwrap();

        let written = fs::read_to_string(&output).unwrap();
        assert!(written.contains("<VGpu>Enable</VGpu>"));
        assert!(written.contains("<Networking>Disable</Networking>"));
        assert!(!fs::read_to_string(&source).unwrap().contains("VGpu"));
        assert_eq!(host.title(), "lab-copy.wsb - WSB Editor");
    }

    #[tokio::test]
    async fn test_edit_session_fails_when_changes_stay_unsaved() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lab.wsb");
        fs::write(&source, "<Configuration></Configuration>").unwrap();
        let args = edit_args(&[source.to_str().unwrap(), "--memory", "2048", "--save-as"]);

        let (client, host) = preset_bridge();
        let mut ops = FileOperations::new(DocumentManager::new(WsbFormat, client.clone()));
        let (result, _host) = tokio::join!(
            async {
                // Save-as dismissed, discard refused, second save-as dismissed
                client.queue_answer(DialogAnswer::Path(None)).await.unwrap();
                client.queue_answer(DialogAnswer::Confirmation(false)).await.unwrap();
                client.queue_answer(DialogAnswer::Path(None)).await.unwrap();
                let result = edit_session(&mut ops, &args).await;
                client.shutdown().await.unwrap();
                result
            },
            host.run()
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("were not saved"));
        assert_eq!(fs::read_to_string(&source).unwrap(), "<Configuration></Configuration>");
    }

    #[tokio::test]
    async fn test_edit_session_rejects_non_wsb_path() {
        let args = edit_args(&["notes.txt", "--set", "VGpu=Enable"]);
        let (client, host) = preset_bridge();
        let mut ops = FileOperations::new(DocumentManager::new(WsbFormat, client.clone()));
        let (result, _host) = tokio::join!(
            async {
                let result = edit_session(&mut ops, &args).await;
                client.shutdown().await.unwrap();
                result
            },
            host.run()
        );
        assert_eq!(result.unwrap_err().to_string(), "Please drop a .wsb file");
    }

    #[test]
    fn test_finish_maps_status() {
        assert!(finish(Some(Status::Success("Saved to: a.wsb".to_string()))).is_ok());
        assert_eq!(
            finish(Some(Status::Error("boom".to_string()))).unwrap_err().to_string(),
            "boom"
        );
        assert_eq!(finish(None).unwrap_err().to_string(), "cancelled");
    }

    #[test]
    fn test_output_conflicts_with_save_as() {
        assert!(
            Cli::try_parse_from(["wsb-editor", "edit", "a.wsb", "--save-as", "-o", "b.wsb"]).is_err()
        );
        let cli = Cli::try_parse_from(["wsb-editor", "show"]).unwrap();
        assert!(matches!(cli.command, Command::Show { path: None }));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("networking=disable").unwrap(),
            (Setting::Networking, Toggle::Disable)
        );
        assert!(parse_assignment("Networking").is_err());
        assert!(parse_assignment("Networking=Maybe").is_err());
    }

    #[test]
    fn test_cli_parses_edit_flags() {
        let cli = Cli::try_parse_from([
            "wsb-editor",
            "edit",
            "C:\\lab.wsb",
            "--set",
            "VGpu=Enable",
            "--map",
            "C:\\Tools;ro",
            "--memory",
            "4096",
        ])
        .unwrap();
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        let mut doc = Document::default();
        args.apply(&mut doc);
        assert_eq!(doc.toggle(Setting::VGpu), Toggle::Enable);
        assert_eq!(doc.mapped_folders, vec![MappedFolder::new("C:\\Tools").with_read_only(true)]);
        assert_eq!(doc.memory_mb.map(|m| m.get()), Some(4096));
    }

    #[test]
    fn test_clear_maps_then_add() {
        let cli = Cli::try_parse_from(["wsb-editor", "edit", "a.wsb", "--clear-maps", "--map", "D:\\x"])
            .unwrap();
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        let mut doc = Document::default();
        doc.mapped_folders.push(MappedFolder::new("C:\\old"));
        args.apply(&mut doc);
        assert_eq!(doc.mapped_folders, vec![MappedFolder::new("D:\\x")]);
    }
}
