use somars::{common::*, config::RunConfig, runner};

/// Render SOMA mocap labeling results across a grid of settings.
#[derive(FromArgs)]
struct Args {
    /// the run config file (json5 or yaml); omit to run the stock render setup.
    #[argh(option)]
    config: Option<PathBuf>,
    /// override soma_work_base_dir from the config.
    #[argh(option)]
    work_dir: Option<PathBuf>,
    /// cap the number of dispatched jobs.
    #[argh(option)]
    max_jobs: Option<usize>,
    /// plan and log the jobs without spawning the render tool.
    #[argh(switch)]
    dry_run: bool,
}

#[async_std::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    // Set signal handler
    ctrlc::set_handler(|| {
        warn!("Interrupted by user");
        runner::request_shutdown();
    })?;

    // Parse arguments
    let args: Args = argh::from_env();

    // Assemble the run configuration; nothing mutates it past this point
    let mut config = match &args.config {
        Some(path) => RunConfig::open(path)?,
        None => RunConfig::default(),
    };
    if let Some(work_dir) = args.work_dir {
        config.soma_work_base_dir = work_dir;
    }
    if let Some(max_jobs) = args.max_jobs {
        config.parallel.max_num_jobs =
            Some(NonZeroUsize::new(max_jobs).ok_or_else(|| anyhow!("--max-jobs must be positive"))?);
    }
    if args.dry_run {
        config.parallel.dry_run = true;
    }

    let summary = runner::run_on_multiple_settings(&config).await?;
    ensure!(
        summary.failed == 0,
        "{} of {} render jobs failed",
        summary.failed,
        summary.planned
    );
    Ok(())
}
