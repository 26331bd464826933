//! Host runner: turns jobs into child processes.

use std::{process::Stdio, sync::Arc};

use {
    anyhow::{Context, bail},
    cadence_config::RunnerConfig,
    cadence_cron::{
        DatasetOptions, Job, JobOptions, JobType, OutputSink, RunJobFactory,
        runner::run_job_fn,
    },
    tokio::{io::AsyncWriteExt, process::Command},
    tokio_util::sync::CancellationToken,
    tracing::debug,
};

/// A factory whose runners execute jobs with the configured programs.
pub fn factory(config: RunnerConfig) -> RunJobFactory {
    let config = Arc::new(config);
    Arc::new(move |_pass| {
        let config = Arc::clone(&config);
        run_job_fn(move |token, sink, job| run(Arc::clone(&config), token, sink, job))
    })
}

/// Program and arguments that execute `job`.
pub fn invocation(config: &RunnerConfig, job: &Job) -> anyhow::Result<(String, Vec<String>)> {
    match job.job_type {
        JobType::ShellScript => Ok((config.shell.clone(), vec![job.name.clone()])),
        JobType::Dataset => {
            let mut args = vec!["save".to_string(), job.display_name().to_string()];
            if let Some(JobOptions::Dataset(options)) = &job.options {
                dataset_args(options, &mut args);
            }
            Ok((config.dataset_command.clone(), args))
        },
        JobType::Unspecified => bail!("job '{}' has no type", job.name),
    }
}

fn dataset_args(options: &DatasetOptions, args: &mut Vec<String>) {
    for (flag, value) in [
        ("--title", &options.title),
        ("--message", &options.message),
        ("--recall", &options.recall),
        ("--body", &options.body_path),
    ] {
        if !value.is_empty() {
            args.push(flag.to_string());
            args.push(value.clone());
        }
    }
    for path in &options.file_paths {
        args.push("--file".to_string());
        args.push(path.clone());
    }
    for (flag, set) in [
        ("--publish", options.publish),
        ("--strict", options.strict),
        ("--force", options.force),
        ("--keep-format", options.keep_format),
        ("--no-render", !options.should_render),
    ] {
        if set {
            args.push(flag.to_string());
        }
    }
    for (flag, pairs) in [("--config", &options.config), ("--secrets", &options.secrets)] {
        for (key, value) in pairs {
            args.push(flag.to_string());
            args.push(format!("{key}={value}"));
        }
    }
}

async fn run(
    config: Arc<RunnerConfig>,
    token: CancellationToken,
    mut sink: OutputSink,
    job: Job,
) -> anyhow::Result<()> {
    let (program, args) = invocation(&config, &job)?;
    debug!(name = %job.name, program = %program, ?args, "spawning job process");

    let mut command = Command::new(&program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if !job.repo_path.is_empty() {
        command.current_dir(&job.repo_path);
    }
    let child = command
        .spawn()
        .with_context(|| format!("failed to start {program}"))?;

    // Dropping the wait future drops the child, which kills it.
    let output = tokio::select! {
        output = child.wait_with_output() => output?,
        () = token.cancelled() => bail!("{program} was cancelled"),
    };

    sink.write_all(&output.stdout).await?;
    sink.write_all(&output.stderr).await?;
    sink.flush().await?;

    if !output.status.success() {
        bail!("{program} {}", output.status);
    }
    Ok(())
}
