use clap::Parser;
use sshdeploy::app::{App, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app = App::initialize();
    let result = app.run(cli).await;
    if result.is_success() {
        println!("{}", result);
    } else {
        app.logger.debug("exiting with failure", None);
        eprintln!("{}", result);
        std::process::exit(1);
    }
}
