//! Client subcommands that talk to a running scheduler.

use std::{collections::BTreeMap, process::ExitCode};

use {
    anyhow::{Context, bail},
    cadence_cron::{
        DatasetOptions, Job, JobOptions, JobType, Periodicity, ShellScriptOptions,
    },
    cadence_gateway::{HttpClient, Scheduler},
    chrono::{DateTime, SecondsFormat, Utc},
    clap::Args,
};

/// Exit code for `ping` when nothing is listening.
const EXIT_UNREACHABLE: u8 = 2;

#[derive(Args, Debug)]
pub struct PageArgs {
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
    /// Maximum number of entries (all when omitted).
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Script path for shell jobs, dataset reference for dataset jobs.
    #[arg(long)]
    pub name: String,
    /// ISO 8601 repeating interval, e.g. R/P1W.
    #[arg(long)]
    pub periodicity: Periodicity,
    /// `dataset` or `shell`.
    #[arg(long = "type")]
    pub job_type: JobType,
    #[arg(long)]
    pub alias: Option<String>,
    /// Working directory for the job.
    #[arg(long)]
    pub repo_path: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub message: Option<String>,
    #[arg(long)]
    pub recall: Option<String>,
    #[arg(long)]
    pub body: Option<String>,
    #[arg(long = "file")]
    pub files: Vec<String>,
    #[arg(long)]
    pub publish: bool,
    #[arg(long)]
    pub strict: bool,
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub keep_format: bool,
    #[arg(long)]
    pub no_render: bool,
    /// `key=value`, repeatable.
    #[arg(long = "config")]
    pub config: Vec<String>,
    /// `key=value`, repeatable.
    #[arg(long = "secrets")]
    pub secrets: Vec<String>,
}

fn parse_pairs(pairs: &[String], flag: &str) -> anyhow::Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("--{flag} expects key=value, got '{pair}'"),
        })
        .collect()
}

impl ScheduleArgs {
    pub fn into_job(self) -> anyhow::Result<Job> {
        let options = match self.job_type {
            JobType::Dataset => Some(JobOptions::Dataset(DatasetOptions {
                title: self.title.unwrap_or_default(),
                message: self.message.unwrap_or_default(),
                recall: self.recall.unwrap_or_default(),
                body_path: self.body.unwrap_or_default(),
                file_paths: self.files,
                publish: self.publish,
                strict: self.strict,
                force: self.force,
                keep_format: self.keep_format,
                should_render: !self.no_render,
                config: parse_pairs(&self.config, "config")?,
                secrets: parse_pairs(&self.secrets, "secrets")?,
            })),
            JobType::ShellScript => Some(JobOptions::ShellScript(ShellScriptOptions::default())),
            JobType::Unspecified => None,
        };
        let mut job = Job::new(self.name, self.job_type, self.periodicity);
        job.alias = self.alias.unwrap_or_default();
        job.repo_path = self.repo_path.unwrap_or_default();
        job.options = options;
        job.validate()?;
        Ok(job)
    }
}

fn timestamp(t: Option<DateTime<Utc>>) -> String {
    t.map_or_else(|| "-".into(), |t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn print_table(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs.");
        return;
    }
    println!(
        "{:<32} {:<8} {:<20} {:>4}  {:<20}  STATUS",
        "NAME", "TYPE", "PERIODICITY", "RUNS", "LAST RUN"
    );
    for job in jobs {
        let last_run = job.run_start.or(job.prev_run_start);
        let status = if job.run_error.is_empty() {
            "ok"
        } else {
            "failed"
        };
        println!(
            "{:<32} {:<8} {:<20} {:>4}  {:<20}  {status}",
            job.name,
            job.job_type.to_string(),
            job.periodicity.to_string(),
            job.run_number,
            timestamp(last_run),
        );
    }
}

fn print_job(job: &Job) {
    println!("Name:         {}", job.name);
    if !job.alias.is_empty() {
        println!("Alias:        {}", job.alias);
    }
    println!("Type:         {}", job.job_type);
    println!("Periodicity:  {}", job.periodicity);
    println!("Runs:         {}", job.run_number);
    println!("Previous run: {}", timestamp(job.prev_run_start));
    if job.run_start.is_some() {
        println!("Started:      {}", timestamp(job.run_start));
        println!("Stopped:      {}", timestamp(job.run_stop));
    }
    if let Some(next) = job.next_exec() {
        println!("Next run:     {}", timestamp(Some(next)));
    }
    if !job.repo_path.is_empty() {
        println!("Repo path:    {}", job.repo_path);
    }
    if !job.log_file_path.is_empty() {
        println!("Output:       {}", job.log_file_path);
    }
    if !job.run_error.is_empty() {
        println!("Error:        {}", job.run_error);
    }
}

pub async fn ping(client: &HttpClient) -> anyhow::Result<ExitCode> {
    match client.ping().await {
        Ok(()) => {
            println!("scheduler is running at {}", client.address());
            Ok(ExitCode::SUCCESS)
        },
        Err(e) if e.is_unreachable() => {
            eprintln!(
                "no scheduler running at {}; start one with `cadence serve`",
                client.address()
            );
            Ok(ExitCode::from(EXIT_UNREACHABLE))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn list(client: &HttpClient, page: PageArgs) -> anyhow::Result<()> {
    print_table(&client.list_jobs(page.offset, page.limit).await?);
    Ok(())
}

pub async fn get(client: &HttpClient, name: &str) -> anyhow::Result<()> {
    print_job(&client.job(name).await?);
    Ok(())
}

pub async fn schedule(client: &HttpClient, args: ScheduleArgs) -> anyhow::Result<()> {
    let job = args.into_job()?;
    let name = job.name.clone();
    client.schedule(job).await?;
    println!("scheduled {name}");
    Ok(())
}

pub async fn unschedule(client: &HttpClient, name: &str) -> anyhow::Result<()> {
    client.unschedule(name).await?;
    println!("unscheduled {name}");
    Ok(())
}

pub async fn logs(client: &HttpClient, page: PageArgs) -> anyhow::Result<()> {
    print_table(&client.list_logs(page.offset, page.limit).await?);
    Ok(())
}

pub async fn log(client: &HttpClient, log_name: &str) -> anyhow::Result<()> {
    print_job(&client.log(log_name).await?);
    Ok(())
}

pub async fn output(client: &HttpClient, log_name: &str) -> anyhow::Result<()> {
    let mut source = client.log_file(log_name).await?;
    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut source, &mut stdout)
        .await
        .context("failed to stream output")?;
    Ok(())
}

pub async fn run(client: &HttpClient, name: &str) -> anyhow::Result<()> {
    let entry = client.run(name).await?;
    print_job(&entry);
    Ok(())
}
