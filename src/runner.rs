use crate::{
    common::*,
    config::{ParallelConfig, RunConfig, RunTask},
    dataset::{self, MocapDataset},
    message::{JobOutcome, JobStatus, RenderJob, RunSummary},
    params,
    paths::WorkDirs,
    render::{self, RenderConfig},
};
use futures::future::join_all;
use itertools::iproduct;

lazy_static! {
    static ref SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
}

pub fn request_shutdown() {
    SHUTDOWN_FLAG.store(true, Ordering::SeqCst);
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_FLAG.load(Ordering::SeqCst)
}

/// Render every configured experiment/data-id/dataset cell over its mocaps.
///
/// The configuration is consumed read-only; everything under the work dir is
/// written by the dispatched jobs, nothing before the first spawn.
pub async fn run_on_multiple_settings(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;

    let mut render_config = config.render.clone();
    render_config.apply(&config.render_overrides)?;

    let mut dirs = match &render_config.support_base_dir {
        Some(support) => WorkDirs::with_support_base_dir(&config.soma_work_base_dir, support),
        None => WorkDirs::new(&config.soma_work_base_dir),
    };
    if let Some(temp) = &render_config.temp_base_dir {
        dirs.blender_temp_dir = temp.clone();
    }
    if let Some(mocap_base) = &config.mocap_base_dir {
        dirs.mocap_base_dir = mocap_base.clone();
    }

    let data_ids = config.soma_data_ids();
    info!(
        "Data ids: [{}]",
        data_ids.iter().map(|id| id.as_str()).join(", ")
    );

    let datasets = dataset::index_all(
        &dirs.mocap_base_dir,
        &config.soma_mocap_target_ds_names,
        &config.mocap_ext,
    )?;

    let jobs = order_jobs(
        plan_jobs(config, &render_config, &dirs, &datasets),
        &config.parallel,
    );
    let mut summary = RunSummary {
        planned: jobs.len(),
        ..RunSummary::default()
    };
    info!(
        "Planned {} jobs over {} datasets",
        jobs.len(),
        datasets.len()
    );

    if config.parallel.dry_run {
        for job in &jobs {
            info!(
                "[dry run] {} {} -> {}",
                job.task,
                job.mocap.path.display(),
                job.out_fname.display()
            );
        }
        return Ok(summary);
    }

    let render_config = Arc::new(render_config);
    let dirs = Arc::new(dirs);
    let semaphore = Arc::new(Semaphore::new(config.parallel.num_workers.get()));
    let mut handles = vec![];
    let mut outcomes = vec![];

    for job in jobs {
        if shutdown_requested() {
            outcomes.push(JobOutcome::skipped(job));
            continue;
        }

        let permit = semaphore.clone().acquire_owned().await?;
        let render_config = render_config.clone();
        let dirs = dirs.clone();
        handles.push(async_std::task::spawn(async move {
            let _permit = permit;
            execute_job(job, &render_config, &dirs).await
        }));
    }
    outcomes.extend(join_all(handles).await);

    if shutdown_requested() {
        warn!("Shutdown was requested, part of the run may be missing");
    }

    for outcome in &outcomes {
        summary.record(&outcome.status);
    }
    write_manifest(&dirs, &outcomes).await?;
    info!(
        "Render run finished: {} completed, {} failed, {} skipped",
        summary.completed, summary.failed, summary.skipped
    );
    Ok(summary)
}

/// Expand the settings grid into per-mocap jobs. Pure; output order follows
/// configuration order (experiments outermost, tasks innermost).
pub fn plan_jobs(
    config: &RunConfig,
    render_config: &RenderConfig,
    dirs: &WorkDirs,
    datasets: &[MocapDataset],
) -> Vec<RenderJob> {
    let data_ids = config.soma_data_ids();
    iproduct!(&config.soma_expr_ids, &data_ids, datasets)
        .flat_map(|(expr_id, data_id, dataset)| {
            let out_dir = dirs.render_out_dir(expr_id, data_id, &dataset.name);
            iproduct!(&dataset.mocaps, &config.run_tasks).map(move |(mocap, task)| {
                let out_dir = if mocap.subject.is_empty() {
                    out_dir.clone()
                } else {
                    out_dir.join(&mocap.subject)
                };
                let blend_fname = render_config.save_final_blend_file.then(|| {
                    out_dir.join(format!("{}.{}", mocap.stem, params::BLEND_FILE_EXT))
                });
                RenderJob {
                    expr_id: expr_id.clone(),
                    data_id: data_id.clone(),
                    ds_name: dataset.name.clone(),
                    mocap: mocap.clone(),
                    task: *task,
                    out_fname: out_dir
                        .join(format!("{}.{}", mocap.stem, params::RENDER_VIDEO_EXT)),
                    blend_fname,
                }
            })
        })
        .collect()
}

/// Apply the job-distribution knobs: optional shuffle, then the job cap.
pub fn order_jobs(mut jobs: Vec<RenderJob>, parallel: &ParallelConfig) -> Vec<RenderJob> {
    if parallel.randomly_run_jobs {
        jobs.shuffle(&mut thread_rng());
    }
    if let Some(max_num_jobs) = parallel.max_num_jobs {
        jobs.truncate(max_num_jobs.get());
    }
    jobs
}

pub(crate) async fn execute_job(
    job: RenderJob,
    render_config: &RenderConfig,
    dirs: &WorkDirs,
) -> JobOutcome {
    let start = Instant::now();
    let status = match job.task {
        RunTask::Render => match run_render(&job, render_config, dirs).await {
            Ok(exit) if exit.success() => JobStatus::Completed,
            Ok(exit) => JobStatus::Failed {
                exit_code: exit.code(),
                message: format!("render exited with {}", exit),
            },
            Err(error) => JobStatus::Failed {
                exit_code: None,
                message: format!("{:#}", error),
            },
        },
        task => JobStatus::Failed {
            exit_code: None,
            message: format!("task {} is not supported by this launcher", task),
        },
    };
    match &status {
        JobStatus::Completed => info!("Rendered {}", job.mocap.path.display()),
        JobStatus::Failed { message, .. } => {
            error!("Job on {} failed: {}", job.mocap.path.display(), message)
        }
        JobStatus::Skipped => {}
    }
    JobOutcome {
        job,
        status,
        duration_ms: start.elapsed().as_millis(),
    }
}

async fn run_render(
    job: &RenderJob,
    render_config: &RenderConfig,
    dirs: &WorkDirs,
) -> Result<std::process::ExitStatus> {
    if let Some(parent) = job.out_fname.parent() {
        async_std::fs::create_dir_all(parent).await?;
    }
    async_std::fs::create_dir_all(&dirs.blender_temp_dir).await?;

    let (program, args) = render::render_command(job, render_config, dirs);
    debug!("Spawning {} {}", program.display(), args.join(" "));
    let status = async_std::process::Command::new(&program)
        .args(&args)
        .status()
        .await
        .with_context(|| format!("cannot spawn render tool {}", program.display()))?;
    Ok(status)
}

async fn write_manifest(dirs: &WorkDirs, outcomes: &[JobOutcome]) -> Result<()> {
    let fname = dirs.render_manifest_fname();
    if let Some(parent) = fname.parent() {
        async_std::fs::create_dir_all(parent).await?;
    }
    let text = serde_json::to_vec_pretty(outcomes)?;
    async_std::fs::write(&fname, text).await?;
    info!("Wrote run manifest to {}", fname.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MocapFile;
    use async_std::task::block_on;
    use std::fs;

    fn dataset_fixture(name: &str, stems: &[&str]) -> MocapDataset {
        MocapDataset {
            name: name.to_owned(),
            root: PathBuf::from("mocaps").join(name),
            mocaps: stems
                .iter()
                .map(|stem| MocapFile {
                    path: PathBuf::from("mocaps")
                        .join(name)
                        .join("soma_subject1")
                        .join(format!("{}.c3d", stem)),
                    subject: "soma_subject1".to_owned(),
                    stem: (*stem).to_owned(),
                })
                .collect(),
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn work_dir_with_mocap(work: &Path, ds_name: &str, rel: &str) {
        touch(
            &work
                .join("support_files/evaluation_mocaps/original")
                .join(ds_name)
                .join(rel),
        );
    }

    #[test]
    fn plan_expands_full_grid_in_order() {
        let mut config = RunConfig::default();
        config.soma_expr_ids = vec!["V48_02_SOMA".into(), "V48_03_SOMA".into()];
        config.soma_data_settings = vec![(5, 3, 0.0, 1.0).into(), (2, 1, 0.5, 0.5).into()];

        let dirs = WorkDirs::new(Path::new("/work"));
        let datasets = vec![dataset_fixture("SOMA_unlabeled_mpc", &["clap_001", "walk_002"])];
        let jobs = plan_jobs(&config, &config.render, &dirs, &datasets);

        // 2 experiments x 2 settings x 1 dataset x 2 mocaps x 1 task
        assert_eq!(jobs.len(), 8);
        assert!(jobs.iter().all(|job| job.task == RunTask::Render));

        let first = &jobs[0];
        assert_eq!(first.expr_id, "V48_02_SOMA");
        assert_eq!(first.data_id.as_str(), "OC_05_G_03_real_0.0_synt_1.0");
        assert_eq!(
            first.out_fname,
            Path::new(
                "/work/training_experiments/V48_02_SOMA/OC_05_G_03_real_0.0_synt_1.0/renders/SOMA_unlabeled_mpc/soma_subject1/clap_001.mp4"
            )
        );
        assert_eq!(
            first.blend_fname.as_deref(),
            Some(Path::new(
                "/work/training_experiments/V48_02_SOMA/OC_05_G_03_real_0.0_synt_1.0/renders/SOMA_unlabeled_mpc/soma_subject1/clap_001.blend"
            ))
        );

        // experiments outermost, mocaps innermost
        assert_eq!(jobs[1].mocap.stem, "walk_002");
        assert_eq!(jobs[2].data_id.as_str(), "OC_02_G_01_real_0.5_synt_0.5");
        assert_eq!(jobs[4].expr_id, "V48_03_SOMA");
    }

    #[test]
    fn planning_skips_blend_file_when_disabled() {
        let mut config = RunConfig::default();
        config.render.save_final_blend_file = false;
        let dirs = WorkDirs::new(Path::new("/work"));
        let datasets = vec![dataset_fixture("ds", &["take"])];
        let jobs = plan_jobs(&config, &config.render, &dirs, &datasets);
        assert_eq!(jobs[0].blend_fname, None);
    }

    #[test]
    fn job_cap_truncates_and_shuffle_preserves_the_job_set() {
        let config = RunConfig::default();
        let dirs = WorkDirs::new(Path::new("/work"));
        let datasets = vec![dataset_fixture("ds", &["a", "b", "c", "d", "e"])];
        let jobs = plan_jobs(&config, &config.render, &dirs, &datasets);

        let capped = order_jobs(
            jobs.clone(),
            &ParallelConfig {
                randomly_run_jobs: false,
                max_num_jobs: NonZeroUsize::new(3),
                ..ParallelConfig::default()
            },
        );
        assert_eq!(capped.len(), 3);
        assert_eq!(capped, jobs[..3].to_vec());

        let shuffled = order_jobs(jobs.clone(), &ParallelConfig::default());
        let sorted_stems = |list: &[RenderJob]| {
            let mut stems = list
                .iter()
                .map(|job| job.mocap.stem.clone())
                .collect::<Vec<_>>();
            stems.sort();
            stems
        };
        assert_eq!(sorted_stems(&shuffled), sorted_stems(&jobs));
    }

    #[test]
    fn dry_run_plans_without_touching_the_work_dir() {
        let work = tempfile::tempdir().unwrap();
        work_dir_with_mocap(work.path(), "SOMA_unlabeled_mpc", "soma_subject1/clap_001.c3d");

        let mut config = RunConfig::default();
        config.soma_work_base_dir = work.path().to_owned();
        config.parallel.dry_run = true;

        let summary = block_on(run_on_multiple_settings(&config)).unwrap();
        assert_eq!(summary.planned, 1);
        assert_eq!(summary.completed, 0);
        assert!(!work.path().join("training_experiments").exists());
        assert!(!work.path().join("blender_temp").exists());
    }

    #[test]
    fn unsupported_task_fails_without_spawning() {
        let config = RunConfig::default();
        let dirs = WorkDirs::new(Path::new("/nonexistent/work"));
        let datasets = vec![dataset_fixture("ds", &["take"])];
        let mut job = plan_jobs(&config, &config.render, &dirs, &datasets).remove(0);
        job.task = RunTask::Mosh;

        let outcome = block_on(execute_job(job, &config.render, &dirs));
        match outcome.status {
            JobStatus::Failed { exit_code, message } => {
                assert_eq!(exit_code, None);
                assert!(message.contains("not supported"));
            }
            status => panic!("unexpected status {:?}", status),
        }
    }

    #[test]
    fn run_records_completed_jobs_and_writes_the_manifest() {
        let work = tempfile::tempdir().unwrap();
        work_dir_with_mocap(work.path(), "SOMA_unlabeled_mpc", "soma_subject1/clap_001.c3d");
        work_dir_with_mocap(work.path(), "SOMA_unlabeled_mpc", "soma_subject1/walk_002.c3d");

        let mut config = RunConfig::default();
        config.soma_work_base_dir = work.path().to_owned();
        config.parallel.randomly_run_jobs = false;
        // stand-in for the render tool; exits 0 ignoring its arguments
        config.render.blender_binary = PathBuf::from("true");

        let summary = block_on(run_on_multiple_settings(&config)).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                planned: 2,
                completed: 2,
                failed: 0,
                skipped: 0,
            }
        );

        let manifest_fname = work.path().join("training_experiments/render_manifest.json");
        assert!(manifest_fname.exists());
        let outcomes: Vec<JobOutcome> =
            serde_json::from_str(&fs::read_to_string(manifest_fname).unwrap()).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|outcome| outcome.status == JobStatus::Completed));

        // job dirs were created on demand
        assert!(work
            .path()
            .join("training_experiments/V48_02_SOMA/OC_05_G_03_real_0.0_synt_1.0/renders/SOMA_unlabeled_mpc/soma_subject1")
            .is_dir());
    }

    #[test]
    fn failing_render_tool_marks_jobs_failed() {
        let work = tempfile::tempdir().unwrap();
        work_dir_with_mocap(work.path(), "SOMA_unlabeled_mpc", "soma_subject1/clap_001.c3d");

        let mut config = RunConfig::default();
        config.soma_work_base_dir = work.path().to_owned();
        // stand-in render tool that always exits 1
        config.render.blender_binary = PathBuf::from("false");

        let summary = block_on(run_on_multiple_settings(&config)).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.completed, 0);
    }

    #[test]
    fn missing_render_tool_is_a_job_failure_not_a_crash() {
        let work = tempfile::tempdir().unwrap();
        work_dir_with_mocap(work.path(), "SOMA_unlabeled_mpc", "soma_subject1/clap_001.c3d");

        let mut config = RunConfig::default();
        config.soma_work_base_dir = work.path().to_owned();
        config.render.blender_binary = PathBuf::from("/nonexistent/blender");

        let summary = block_on(run_on_multiple_settings(&config)).unwrap();
        assert_eq!(summary.failed, 1);
    }
}
