mod session;

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process;

use gate_core::config::GateConfig;
use session::{Session, parse_duration};

struct Options {
    config: GateConfig,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: gate-emulator [--transcript <path>] [--cold-timeout <duration>] [--cooldown <duration>] \
             [--press-window <duration>] [--slot-address <byte>]"
        );
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let styled = stdout.is_terminal();
    let mut writer = stdout.lock();
    let mut session = Session::new(options.config, options.transcript.as_deref(), styled)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Gate Controller Emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for response in session.banner()? {
        writeln!(writer, "{response}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        config: GateConfig::default(),
        transcript: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--transcript" => options.transcript = Some(PathBuf::from(value()?)),
            "--cold-timeout" => {
                let timeout = parse_duration(&value()?)?;
                options.config = options.config.with_default_safety_timeout(timeout);
            }
            "--cooldown" => {
                let cooldown = parse_duration(&value()?)?;
                options.config = options.config.with_input_cooldown(cooldown);
            }
            "--press-window" => {
                let window = parse_duration(&value()?)?;
                options.config = options.config.with_press_window(window);
            }
            "--slot-address" => {
                let text = value()?;
                let address = text
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid slot address `{text}`"))?;
                options.config = options.config.with_timeout_address(address);
            }
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(options)
}
