//! Ask a question against a NotebookLM notebook.
//!
//! Usage:
//!   cargo run --example ask -- <notebook-url> "<question>" [youtube-url]
//!
//! Launches a visible browser so the Google login can be completed
//! interactively on first run.

use std::process::ExitCode;

use notebook_puppet::{Config, Error, NotebookController};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notebook_puppet=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(notebook_url), Some(question)) = (args.next(), args.next()) else {
        eprintln!("usage: ask <notebook-url> \"<question>\" [youtube-url]");
        return ExitCode::FAILURE;
    };
    let source_url = args.next();

    match run(&notebook_url, &question, source_url.as_deref()).await {
        Ok(answer) => {
            println!("{answer}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(
    notebook_url: &str,
    question: &str,
    source_url: Option<&str>,
) -> Result<String, Error> {
    let config = Config::builder().headless(false).build();
    let mut controller = NotebookController::connect(config).await?;

    controller.authenticate().await?;
    controller.open_notebook(notebook_url).await?;
    if let Some(url) = source_url {
        controller.add_source(url).await?;
    }
    let answer = controller.ask(question).await?;

    controller.close().await?;
    Ok(answer)
}
