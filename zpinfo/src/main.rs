use std::process::ExitCode;

use zpinfo::{logging, report, Error, MonitorConfig, Options, Orchestrator, OsSignals, ZonePlayer};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let options = match Options::try_parse() {
        Ok(options) => options,
        Err(e) => return report(Error::Usage(e)),
    };

    if let Err(e) = logging::init(options.mode) {
        eprintln!("zpinfo: {e}");
        return ExitCode::FAILURE;
    }

    match run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

async fn run(options: Options) -> Result<(), Error> {
    let monitor = MonitorConfig::from_env()?;
    let client = ZonePlayer::new(&options, &monitor)?;
    let mut orchestrator = Orchestrator::new(options, monitor, client, OsSignals::default());
    orchestrator.run(&mut std::io::stdout()).await
}
