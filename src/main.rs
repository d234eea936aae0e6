use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use askdocs::{
    cli::{AskArgs, Cli, Command, SearchArgs},
    data_dir::DataDir,
    embedding::FastEmbedProvider,
    engine::{InitializeReport, RetrievalEngine},
    error::Result,
    generation::{ChatClient, Generator},
    loader::FsSource,
    text_util::excerpt,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ASKDOCS_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match &cli.command {
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "askdocs",
                &mut std::io::stdout(),
            );
        }
        Command::Index(args) => {
            let engine = build_engine(&cli)?;
            let report = if args.force {
                engine.rebuild()?
            } else {
                engine.initialize()?
            };
            print_index_report(&report);
        }
        Command::Ask(args) => {
            let engine = build_engine(&cli)?;
            engine.initialize()?;
            cmd_ask(&engine, args).await?;
        }
        Command::Search(args) => {
            let engine = build_engine(&cli)?;
            engine.initialize()?;
            cmd_search(&engine, args)?;
        }
        Command::Status(args) => {
            let engine = build_engine(&cli)?;
            engine.initialize()?;
            cmd_status(&engine, args.json)?;
        }
    }

    Ok(())
}

fn build_engine(cli: &Cli) -> Result<RetrievalEngine> {
    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let source = FsSource::new(&cli.docs)?;
    let generator = ChatClient::from_env()?
        .map(|client| Box::new(client) as Box<dyn Generator>);

    if generator.is_none() {
        tracing::info!(
            "no generation API key configured; answers will use the \
             retrieval fallback"
        );
    }

    Ok(RetrievalEngine::new(
        Box::new(source),
        Arc::new(FastEmbedProvider::new()),
        generator,
        data_dir,
    ))
}

fn print_index_report(report: &InitializeReport) {
    if report.rebuilt {
        println!(
            "Indexed {} document(s), {} chunk(s).",
            report.documents, report.chunks
        );
    } else {
        println!(
            "Index is up to date: {} document(s), {} chunk(s).",
            report.documents, report.chunks
        );
    }

    if let Some(staleness) = &report.staleness {
        for locator in &staleness.added {
            println!("  added:   {locator}");
        }
        for locator in &staleness.removed {
            println!("  removed: {locator}");
        }
    }
    for locator in &report.skipped {
        println!("  skipped: {locator}");
    }
}

async fn cmd_ask(engine: &RetrievalEngine, args: &AskArgs) -> Result<()> {
    let response =
        engine.query(&args.question, args.depth.into()).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response)
                .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        );
        return Ok(());
    }

    println!("{}", response.response);

    if args.show_context {
        println!("\n--- context used ---\n{}", response.context_used);
    }

    Ok(())
}

fn cmd_search(engine: &RetrievalEngine, args: &SearchArgs) -> Result<()> {
    let result = engine.search(&args.query, args.depth.into())?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result)
                .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        );
        return Ok(());
    }

    println!("Documents:");
    for doc in &result.documents {
        println!(
            "{:>3}. [{:.3}] {} ({})",
            doc.rank, doc.relevance, doc.locator, doc.kind
        );
    }

    println!("\nChunks:");
    for chunk in &result.chunks {
        println!(
            "{:>3}. [{:.3}] {} p{}: {}",
            chunk.rank,
            chunk.relevance,
            chunk.locator,
            chunk.page_number,
            excerpt(chunk.text.replace('\n', " ").trim(), 80)
        );
    }

    println!(
        "\n{} document(s), {} chunk(s)",
        result.documents.len(),
        result.chunks.len()
    );
    Ok(())
}

fn cmd_status(engine: &RetrievalEngine, json: bool) -> Result<()> {
    let summary = engine.collection_summary()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary)
                .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        );
        return Ok(());
    }

    println!(
        "{} document(s), {} chunk(s)",
        summary.total_documents, summary.total_chunks
    );
    for (kind, count) in &summary.kind_counts {
        println!("  {kind}: {count}");
    }

    println!();
    for doc in &summary.documents {
        println!(
            "{}\t{}\t{} page(s)\t{}",
            doc.name,
            doc.kind,
            doc.page_count,
            doc.top_topics.join(", ")
        );
    }
    Ok(())
}
