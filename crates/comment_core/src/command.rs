use thiserror::Error;

/// Operator command accepted while a harvest is running.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
    Status,
    /// Requests per minute across all workers.
    Rate(u32),
    /// Inter-page delay bounds in seconds.
    Delay { min_secs: f64, max_secs: f64 },
    Workers(usize),
    Cap(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{command}` expects {expected}")]
    BadArguments {
        command: &'static str,
        expected: &'static str,
    },
}

/// Parses one line of operator input. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ControlCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "pause" => no_args("pause", &args, ControlCommand::Pause)?,
        "resume" | "start" => no_args("resume", &args, ControlCommand::Resume)?,
        "stop" | "quit" => no_args("stop", &args, ControlCommand::Stop)?,
        "status" => no_args("status", &args, ControlCommand::Status)?,
        "rate" | "rpm" => {
            ControlCommand::Rate(single("rate", "one whole number (requests per minute)", &args)?)
        }
        "workers" => ControlCommand::Workers(single("workers", "one whole number", &args)?),
        "cap" => ControlCommand::Cap(single("cap", "one whole number", &args)?),
        "delay" => {
            const EXPECTED: &str = "two numbers: min and max seconds";
            match args.as_slice() {
                [min, max] => {
                    let min_secs = min.parse::<f64>().map_err(|_| bad("delay", EXPECTED))?;
                    let max_secs = max.parse::<f64>().map_err(|_| bad("delay", EXPECTED))?;
                    ControlCommand::Delay { min_secs, max_secs }
                }
                _ => return Err(bad("delay", EXPECTED)),
            }
        }
        _ => return Err(CommandError::Unknown(head.to_string())),
    };
    Ok(Some(command))
}

fn no_args(
    command: &'static str,
    args: &[&str],
    parsed: ControlCommand,
) -> Result<ControlCommand, CommandError> {
    if args.is_empty() {
        Ok(parsed)
    } else {
        Err(bad(command, "no arguments"))
    }
}

fn single<T: std::str::FromStr>(
    command: &'static str,
    expected: &'static str,
    args: &[&str],
) -> Result<T, CommandError> {
    match args {
        [value] => value.parse::<T>().map_err(|_| bad(command, expected)),
        _ => Err(bad(command, expected)),
    }
}

fn bad(command: &'static str, expected: &'static str) -> CommandError {
    CommandError::BadArguments { command, expected }
}
