mod audio;
mod config;
mod devices;
mod error;
mod keys;
mod midi;
mod pitch;
mod sink;
mod stability;
mod types;
mod ui;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, never, select, unbounded, Sender};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::File,
    io::{self, BufRead},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use audio::capture::{list_input_devices, CaptureSource, CpalCapture};
use audio::session::{CaptureFactory, Session, SinkFactory};
use audio::wav::WavCapture;
use config::{OutputMode, SessionConfig};
use error::SessionError;
use keys::emitter::{self, KeyBackend};
use keys::mapping::{KeyMapping, MappingCatalog};
use midi::output::MidiConnection;
use sink::{KeyboardSink, MidiSink, NoteEventSink};
use stability::parameters::StabilityParameters;
use types::events::Notification;
use ui::{
    app::{App, Request},
    events, render,
};

/// Turns a monophonic audio input into MIDI notes or key presses
#[derive(Parser, Debug)]
#[command(name = "stylomidi")]
#[command(about = "Monophonic audio to MIDI and keyboard converter", long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// List available devices and exit
    #[arg(short = 'l', long = "list")]
    list_devices: bool,

    /// Output mode
    #[arg(short = 'm', long = "mode", value_enum)]
    mode: Option<OutputMode>,

    /// Read audio from a WAV file instead of an input device
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Audio input device (index or name)
    #[arg(long = "audio-in")]
    audio_in: Option<String>,

    /// MIDI output port (index or name)
    #[arg(long = "midi-out")]
    midi_out: Option<String>,

    /// Key mapping file
    #[arg(long = "mapping")]
    mapping: Option<PathBuf>,

    /// Required agreement within the observation window
    #[arg(short = 's', long = "stability")]
    stability: Option<usize>,

    /// Run without the terminal UI
    #[arg(long = "headless")]
    headless: bool,
}

impl Args {
    /// Command line flags take precedence over the config file
    fn apply_to(&self, config: &mut SessionConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(audio_in) = &self.audio_in {
            config.devices.audioin = Some(audio_in.clone());
        }
        if let Some(midi_out) = &self.midi_out {
            config.devices.midiout = Some(midi_out.clone());
        }
        if let Some(mapping) = &self.mapping {
            config.keyboard.mapping = Some(mapping.clone());
        }
        if let Some(required) = self.stability {
            config.stability.required = required;
        }
    }
}

/// Everything needed to open a session's sink and capture source
struct Launcher {
    config: SessionConfig,
    input: Option<PathBuf>,
}

impl Launcher {
    /// Start a session in `mode`; the worker opens the sink before the capture
    fn start(
        &self,
        mode: OutputMode,
        mapping: &KeyMapping,
        params: Arc<StabilityParameters>,
        notifications: Sender<Notification>,
    ) -> Result<Session, SessionError> {
        let open_sink: SinkFactory = match mode {
            OutputMode::Midi => {
                let search = self.config.devices.midiout.clone();
                let channel = self.config.midi.channel_index();
                let velocity = self.config.midi.velocity;
                Box::new(move || open_midi_sink(search.as_deref(), channel, velocity))
            }
            OutputMode::Keys => {
                let mapping = mapping.clone();
                let backend = self.config.keyboard.backend;
                Box::new(move || Ok(open_keyboard_sink(mapping, backend)))
            }
        };

        let open_capture: CaptureFactory = match &self.input {
            Some(path) => {
                let path = path.clone();
                Box::new(move || open_wav_capture(&path))
            }
            None => {
                let search = self.config.devices.audioin.clone();
                let sample_rate = self.config.audio.sample_rate;
                Box::new(move || open_device_capture(search.as_deref(), sample_rate))
            }
        };

        Session::start(self.config.session_settings(), open_sink, open_capture, params, notifications)
    }
}

fn open_midi_sink(search: Option<&str>, channel: u8, velocity: u8) -> Result<Box<dyn NoteEventSink>, SessionError> {
    let connection = MidiConnection::connect(search)?;
    let label = connection.port_name().to_string();
    Ok(Box::new(MidiSink::new(connection, channel, velocity, label)))
}

fn open_keyboard_sink(mapping: KeyMapping, backend: KeyBackend) -> Box<dyn NoteEventSink> {
    Box::new(KeyboardSink::new(mapping, emitter::detect(backend)))
}

fn open_wav_capture(path: &Path) -> Result<Box<dyn CaptureSource>, SessionError> {
    Ok(Box::new(WavCapture::open(path)?))
}

fn open_device_capture(search: Option<&str>, sample_rate: u32) -> Result<Box<dyn CaptureSource>, SessionError> {
    Ok(Box::new(CpalCapture::open(search, sample_rate)?))
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Handle --list flag
    if args.list_devices {
        return print_devices();
    }

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate().context("Invalid settings")?;

    let tui = !args.headless;
    init_logging(&config, tui)?;

    if tui && config.keyboard.backend == KeyBackend::Print {
        warn!("The print key backend writes to stdout and will garble the terminal UI");
    }

    // Keyboard mode can be selected from the UI, so resolve the mappings up front there
    let catalog = if tui || config.mode == OutputMode::Keys {
        resolve_mappings(&config)
    } else {
        MappingCatalog::default()
    };

    let params = Arc::new(StabilityParameters::new(config.stability_config()));
    let mode = config.mode;
    let launcher = Launcher {
        config,
        input: args.input,
    };

    if tui {
        run_tui(&launcher, params, mode, catalog)
    } else {
        let mapping = catalog.load_selected();
        if mode == OutputMode::Keys {
            info!("Key mapping:\n{}", mapping.describe());
        }
        run_headless(&launcher, params, mode, &mapping)
    }
}

/// List audio inputs and MIDI outputs
fn print_devices() -> Result<()> {
    let audio_devices = list_input_devices()?;
    let midi_devices = MidiConnection::list_devices()?;

    println!("Available Audio Input Devices:");
    for (i, device) in audio_devices.iter().enumerate() {
        println!("  {}: {}", i, device);
    }
    println!("\nAvailable MIDI Output Devices:");
    for (i, device) in midi_devices.iter().enumerate() {
        println!("  {}: {}", i, device);
    }
    Ok(())
}

/// Logs go to a file under the TUI so the alternate screen stays clean
fn init_logging(config: &SessionConfig, tui: bool) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if tui {
        let file = File::create(&config.log_file)
            .with_context(|| format!("Failed to create log file: {}", config.log_file.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Explicit mapping file, else every file in the mapping directory with the first selected
fn resolve_mappings(config: &SessionConfig) -> MappingCatalog {
    if let Some(path) = &config.keyboard.mapping {
        return MappingCatalog::single(path);
    }

    match MappingCatalog::scan(&config.keyboard.mapping_dir) {
        Ok(catalog) => {
            info!(
                "Found {} mapping files in {}",
                catalog.files().len(),
                config.keyboard.mapping_dir.display()
            );
            catalog
        }
        Err(e) => {
            warn!(
                "Cannot read mapping directory {}: {}",
                config.keyboard.mapping_dir.display(),
                e
            );
            MappingCatalog::default()
        }
    }
}

/// Run one session without a UI until input ends, stdin closes or an error occurs
fn run_headless(
    launcher: &Launcher,
    params: Arc<StabilityParameters>,
    mode: OutputMode,
    mapping: &KeyMapping,
) -> Result<()> {
    let (notification_tx, notification_rx) = unbounded();
    let mut session = launcher.start(mode, mapping, params, notification_tx)?;
    info!("Running in {} mode", mode.label());

    // Live input runs until a line or EOF arrives on stdin
    let stop_rx = if launcher.input.is_none() {
        let (stop_tx, stop_rx) = bounded(1);
        thread::spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            let _ = stop_tx.send(());
        });
        info!("Press Enter to stop");
        stop_rx
    } else {
        never()
    };
    let idle = never();
    let mut stopping = false;

    loop {
        let stop_signal = if stopping { &idle } else { &stop_rx };
        select! {
            recv(notification_rx) -> notification => match notification {
                Ok(Notification::Stopped { error, overflows }) => {
                    if overflows > 0 {
                        warn!("{} capture overflows", overflows);
                    }
                    return match error {
                        Some(error) => Err(anyhow!(error)),
                        None => Ok(()),
                    };
                }
                Ok(_) => {}
                Err(_) => return Ok(()),
            },
            recv(stop_signal) -> _ => {
                session.stop();
                stopping = true;
            }
        }
    }
}

/// Run the terminal monitor
fn run_tui(
    launcher: &Launcher,
    params: Arc<StabilityParameters>,
    mode: OutputMode,
    catalog: MappingCatalog,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(params, mode, catalog);
    info!("Key mapping {}:\n{}", app.mapping_label(), app.mapping.describe());

    // Run UI loop
    let result = run_ui_loop(&mut terminal, &mut app, launcher);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    launcher: &Launcher,
) -> Result<()> {
    let (notification_tx, notification_rx) = unbounded();
    let mut session: Option<Session> = None;

    loop {
        // Update state from the session worker
        while let Ok(notification) = notification_rx.try_recv() {
            if matches!(notification, Notification::Stopped { .. }) {
                // Worker has already released everything; joining is immediate
                session = None;
            }
            app.apply(notification);
        }

        // Render UI
        terminal.draw(|f| render::render(f, app))?;

        // Handle events
        events::handle_events(app)?;

        match app.take_request() {
            Some(Request::Start) => {
                match launcher.start(
                    app.mode,
                    &app.mapping,
                    Arc::clone(&app.parameters),
                    notification_tx.clone(),
                ) {
                    Ok(started) => {
                        session = Some(started);
                        app.started();
                    }
                    Err(e) => {
                        warn!("Failed to start session: {}", e);
                        app.start_failed(e);
                    }
                }
            }
            Some(Request::Stop) => {
                if let Some(mut running) = session.take() {
                    running.stop();
                }
            }
            None => {}
        }

        // Check if should quit
        if app.should_quit {
            break;
        }

        // Small sleep to reduce CPU usage
        thread::sleep(Duration::from_millis(16)); // ~60 FPS
    }

    if let Some(mut running) = session.take() {
        running.stop();
    }
    Ok(())
}
