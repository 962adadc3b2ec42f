//! Operator input: stdin commands and Ctrl-C.

use std::io::{self, BufRead};
use std::thread;

use comment_core::{parse_command, ControlCommand};
use comment_engine::HarvestControls;
use engine_logging::{engine_info, engine_warn};

const HELP: &str =
    "commands: pause | resume | stop | status | rate <rpm> | delay <min> <max> | workers <n> | cap <n>";

/// Reads commands from stdin on a plain thread so a blocked read never holds
/// up runtime shutdown. The thread ends at EOF.
pub fn spawn_stdin_reader(controls: HarvestControls) {
    let spawned = thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                handle_line(&controls, &line);
            }
        });
    if let Err(err) = spawned {
        engine_warn!("Control input unavailable: {}", err);
    }
}

fn handle_line(controls: &HarvestControls, line: &str) {
    match parse_command(line) {
        Ok(Some(ControlCommand::Status)) => println!("{}", controls.status()),
        Ok(Some(command)) => controls.apply(command),
        Ok(None) => {}
        Err(err) => eprintln!("{err}\n{HELP}"),
    }
}

/// First Ctrl-C requests a graceful stop; a second one exits at once.
pub async fn stop_on_ctrl_c(controls: HarvestControls) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        engine_warn!("Ctrl-C handler unavailable: {}", err);
        return;
    }
    engine_info!("Ctrl-C received; finishing in-flight work (press again to abort)");
    controls.apply(ControlCommand::Stop);

    if tokio::signal::ctrl_c().await.is_ok() {
        engine_warn!("Second Ctrl-C; aborting without waiting for workers");
        std::process::exit(130);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use comment_engine::{ControlSignal, RateLimiter, RateSettings, Tunables};

    use super::*;

    fn controls() -> HarvestControls {
        HarvestControls {
            control: ControlSignal::new(),
            limiter: Arc::new(RateLimiter::new(RateSettings::default())),
            tunables: Arc::new(Tunables::new(3, 100)),
        }
    }

    #[test]
    fn lines_drive_the_controls() {
        let controls = controls();
        handle_line(&controls, "pause");
        assert!(controls.control.should_pause());
        handle_line(&controls, "RESUME");
        assert!(!controls.control.should_pause());
        handle_line(&controls, "workers 6");
        assert_eq!(controls.tunables.workers(), 6);
        handle_line(&controls, "rate 30");
        assert_eq!(controls.limiter.settings().requests_per_minute, 30);
    }

    #[test]
    fn bad_lines_change_nothing() {
        let controls = controls();
        handle_line(&controls, "rate fast");
        handle_line(&controls, "jump");
        handle_line(&controls, "   ");
        assert_eq!(controls.limiter.settings(), RateSettings::default());
        assert!(!controls.control.should_stop());
    }
}
