//! CLI entry point: runs any file as a bytevm ROM without a front end.
//!
//! Program output goes to stdout, one line per WRITE. Diagnostics go to
//! stderr through `tracing`. Without `-s`, each READ takes one line from stdin.

use std::io::{self, BufRead, Write};
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::process::ExitCode;

use bytevm_core::{
    CoreConfig, Engine, FaultCode, MappingMode, Notification, NotificationSink, RomLoadError,
    StepOutcome, SyntheticInput, DEFAULT_ENTRY_POINT,
};
use clap::{ArgGroup, Parser};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bytevm", version, about = "Run any file as code on a banked 16-bit machine")]
#[command(group(ArgGroup::new("mapping").required(true).args(["preloaded", "streaming"])))]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Preload the first 1 MiB of the file as 16 fixed banks.
    #[arg(short = 'm')]
    preloaded: bool,

    /// Stream the whole file from disk, one 32 KiB bank at a time.
    #[arg(short = 'o')]
    streaming: bool,

    /// File to execute.
    #[arg(value_name = "ROM_IMAGE")]
    rom_image: PathBuf,

    /// Answer READ instructions with built-in messages instead of stdin.
    #[arg(short = 's')]
    synthetic_input: bool,

    /// Stop after this many retired instructions.
    #[arg(long, value_name = "N")]
    max_steps: Option<NonZeroU64>,

    /// Log every retired instruction (overrides RUST_LOG).
    #[arg(long)]
    trace: bool,
}

impl Cli {
    const fn mapping_mode(&self) -> MappingMode {
        if self.streaming {
            MappingMode::Streaming
        } else {
            MappingMode::Preloaded
        }
    }

    const fn core_config(&self) -> CoreConfig {
        CoreConfig {
            mapping_mode: self.mapping_mode(),
            entry_point: DEFAULT_ENTRY_POINT,
            trace_instructions: self.trace,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Rom(#[from] RomLoadError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("{cause} at {address:#06x}")]
    Fault { cause: FaultCode, address: u16 },
}

/// Writes program output to `out`, keeping the first write error.
struct OutputSink<W> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> OutputSink<W> {
    const fn new(out: W) -> Self {
        Self { out, error: None }
    }

    fn finish_batch(&mut self) -> io::Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.out.flush()
    }
}

impl<W: Write> NotificationSink for OutputSink<W> {
    fn on_notification(&mut self, notification: Notification) {
        match notification {
            Notification::OutputWritten(text) => {
                if self.error.is_none() {
                    self.error = writeln!(self.out, "{text}").err();
                }
            }
            Notification::RomBankSwitched { bank } => tracing::debug!(bank, "bank switched"),
            Notification::ByteChanged { .. } | Notification::RangeChanged { .. } => {}
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.trace);

    match run(&cli, io::stdin().lock(), io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "bytevm stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(trace: bool) {
    let filter = if trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli, input: impl BufRead, output: impl Write) -> Result<(), CliError> {
    let mut engine = Engine::open(&cli.rom_image, cli.core_config())?;
    if cli.synthetic_input {
        engine.set_input_provider(Some(Box::new(SyntheticInput::default())));
    }
    tracing::info!(
        rom = %cli.rom_image.display(),
        mode = ?engine.mapping_mode(),
        "starting"
    );
    drive(&mut engine, input, output, cli.max_steps.map(NonZeroU64::get))
}

/// Steps run between output error checks.
const RUN_CHUNK_STEPS: u64 = 4096;

/// Runs `engine` until a fault, end of input, an output error, or `budget`
/// retirements.
fn drive(
    engine: &mut Engine,
    mut input: impl BufRead,
    output: impl Write,
    mut budget: Option<u64>,
) -> Result<(), CliError> {
    let mut sink = OutputSink::new(output);
    loop {
        let chunk = budget.map_or(RUN_CHUNK_STEPS, |left| left.min(RUN_CHUNK_STEPS));
        let Some(limit) = NonZeroU64::new(chunk) else {
            tracing::info!("step budget exhausted");
            sink.finish_batch()?;
            return Ok(());
        };

        let outcome = engine.run(&mut sink, Some(limit));
        sink.finish_batch()?;
        budget = budget.map(|left| left.saturating_sub(outcome.steps));

        match outcome.final_step {
            StepOutcome::Retired { .. } => {}
            StepOutcome::Fault { cause } => {
                return Err(CliError::Fault {
                    cause,
                    address: engine.ip(),
                });
            }
            StepOutcome::AwaitingInput { address } => {
                let Some(line) = read_line(&mut input)? else {
                    tracing::info!(address, "input closed while a read was pending");
                    return Ok(());
                };
                if let StepOutcome::Fault { cause } = engine.resume_with_input(&line, &mut sink) {
                    return Err(CliError::Fault { cause, address });
                }
                sink.finish_batch()?;
                budget = budget.map(|left| left.saturating_sub(1));
            }
        }
    }
}

fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, ErrorKind, Write};

    use clap::{CommandFactory, Parser};

    use super::{drive, read_line, Cli, CliError, MappingMode};
    use bytevm_core::{CoreConfig, Engine, FaultCode};

    /// Stdout after the reading end of the pipe went away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn engine(image: &[u8]) -> Engine {
        Engine::from_image(Cursor::new(image.to_vec()), CoreConfig::default())
            .expect("in-memory image")
    }

    fn drive_to_string(
        engine: &mut Engine,
        stdin: &str,
        budget: Option<u64>,
    ) -> (Result<(), CliError>, String) {
        let mut out = Vec::new();
        let result = drive(engine, Cursor::new(stdin.to_owned()), &mut out, budget);
        (result, String::from_utf8(out).expect("ascii output"))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mapping_flag_selects_mode() {
        let cli = Cli::try_parse_from(["bytevm", "-o", "rom.bin", "-s"]).expect("valid args");
        assert_eq!(cli.mapping_mode(), MappingMode::Streaming);
        assert!(cli.synthetic_input);
        assert!(cli.max_steps.is_none());

        let cli = Cli::try_parse_from(["bytevm", "-m", "rom.bin", "--max-steps", "10", "--trace"])
            .expect("valid args");
        assert_eq!(cli.mapping_mode(), MappingMode::Preloaded);
        assert_eq!(cli.max_steps.map(std::num::NonZeroU64::get), Some(10));
        assert!(cli.core_config().trace_instructions);
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["bytevm", "rom.bin"]).is_err());
        assert!(Cli::try_parse_from(["bytevm", "-m", "-o", "rom.bin"]).is_err());
        assert!(Cli::try_parse_from(["bytevm", "-m"]).is_err());
        assert!(Cli::try_parse_from(["bytevm", "-m", "a.bin", "b.bin"]).is_err());
        assert!(Cli::try_parse_from(["bytevm", "-m", "rom.bin", "--max-steps", "0"]).is_err());
    }

    #[test]
    fn echo_program_copies_stdin_to_stdout() {
        // READ 0x0100; WRITE 0x0100; fault on IMM R?FF.
        let mut engine = engine(&[32, 0x00, 0x01, 30, 0x00, 0x01, 0x01, 0xFF, 0, 0]);
        let (result, out) = drive_to_string(&mut engine, "hello\r\n", None);

        assert_eq!(out, "hello\n");
        assert!(matches!(
            result,
            Err(CliError::Fault {
                cause: FaultCode::InvalidRegister,
                address: 0x8006
            })
        ));
    }

    #[test]
    fn closed_stdin_ends_run_cleanly() {
        let mut engine = engine(&[32, 0x00, 0x01]);
        let (result, out) = drive_to_string(&mut engine, "", None);
        assert!(result.is_ok());
        assert!(out.is_empty());
        assert_eq!(engine.ip(), 0x8000);
    }

    #[test]
    fn budget_counts_resumed_reads() {
        let mut engine = engine(&[32, 0x00, 0x01]);
        let (result, _) = drive_to_string(&mut engine, "x\n", Some(3));
        assert!(result.is_ok());
        assert_eq!(engine.ip(), 0x8005);
    }

    #[test]
    fn read_line_strips_line_endings_only() {
        let mut input = Cursor::new("  spaced \r\nnext");
        assert_eq!(read_line(&mut input).expect("read"), Some("  spaced ".to_owned()));
        assert_eq!(read_line(&mut input).expect("read"), Some("next".to_owned()));
        assert_eq!(read_line(&mut input).expect("read"), None);
    }

    #[test]
    fn output_errors_surface_after_the_batch() {
        let mut engine = engine(&[30, 0x00, 0x80]);
        let result = drive(&mut engine, Cursor::new(""), ClosedPipe, Some(1));
        assert!(matches!(result, Err(CliError::Io(_))));
    }

    #[test]
    fn closed_output_stops_an_unbounded_loop() {
        // WRITE 0x8000; JNE 0x8000 never faults or reads.
        let mut engine = engine(&[30, 0x00, 0x80, 19, 0x00, 0x80]);
        let result = drive(&mut engine, Cursor::new(""), ClosedPipe, None);

        match result {
            Err(CliError::Io(err)) => assert_eq!(err.kind(), ErrorKind::BrokenPipe),
            other => panic!("expected an output error, got {other:?}"),
        }
    }
}
