use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use knit_core::prelude::*;
use knit_exec::{BootstrapBridge, BridgeConfig};
use knit_model::{ClusterConfig, ConfigSource, Env, HadoopConfDir, LaunchSpec, Overrides};
use knit_observe::{LoggerConfig, LoggerFormat, LoggerLevel, init_logger};
use knit_prometheus::PrometheusMetrics;
use knit_yarn::{YarnApi, YarnApiConfig};

#[derive(Parser, Debug)]
#[command(
    name = "knit-agentd",
    version,
    about = "Launch one application on a YARN cluster, wait for it and print its logs"
)]
struct Args {
    /// Shell command run in every worker container.
    #[arg(long)]
    command: String,

    #[arg(long, default_value_t = 1)]
    containers: u32,

    #[arg(long, default_value_t = 1)]
    vcores: u32,

    /// Memory per container, MB.
    #[arg(long, default_value_t = 128)]
    memory: u64,

    /// File to localize into every container; `hdfs://` paths are not uploaded.
    #[arg(long = "file")]
    files: Vec<String>,

    /// Environment entry for the master and workers.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    #[arg(long, default_value = knit_model::DEFAULT_APP_NAME)]
    name: String,

    /// Scheduler queue; defaults to the configured one.
    #[arg(long)]
    queue: Option<String>,

    /// Skip the capacity preflight.
    #[arg(long)]
    no_checks: bool,

    /// Give up waiting after this many seconds; the application is then killed.
    #[arg(long, default_value_t = 3600)]
    wait_secs: u64,

    /// Resource manager host.
    #[arg(long)]
    rm: Option<String>,

    #[arg(long)]
    rm_port: Option<u16>,

    /// text, json or journald.
    #[arg(long, default_value = "text")]
    log_format: String,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory holding the bridge jar.
    #[arg(long, env = "KNIT_HOME")]
    knit_home: PathBuf,

    /// Serve Prometheus metrics on `/metrics` at this address.
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

impl Args {
    fn launch_spec(&self, conf: &ClusterConfig) -> LaunchSpec {
        let mut spec = LaunchSpec::new(self.command.clone())
            .with_containers(self.containers, self.vcores, self.memory)
            .with_name(self.name.clone())
            .with_queue(self.queue.clone().unwrap_or_else(|| conf.queue.clone()));
        for file in &self.files {
            spec = spec.with_file(file.clone());
        }
        if !self.env.is_empty() {
            let mut env = Env::new();
            for (k, v) in &self.env {
                env.push(k.clone(), v.clone());
            }
            spec = spec.with_env(env);
        }
        if self.no_checks {
            spec = spec.without_checks();
        }
        spec
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1) logger
    let log_cfg = LoggerConfig {
        format: args.log_format.parse::<LoggerFormat>()?,
        level: LoggerLevel::new(args.log_level.clone())?,
        ..Default::default()
    };
    init_logger(&log_cfg)?;

    // 2) cluster configuration
    let conf_dir = HadoopConfDir::discover();
    let discovered = conf_dir
        .load()
        .with_context(|| format!("reading {}", conf_dir.dir().display()))?;
    let conf = ClusterConfig::resolve(
        discovered,
        Overrides {
            rm: args.rm.clone(),
            rm_port: args.rm_port,
            ..Default::default()
        },
    )?;
    info!(rm = %conf.rm, nn = %conf.nn, user = %conf.user, "cluster configuration resolved");

    // 3) metrics
    let token = CancellationToken::new();
    let metrics = PrometheusMetrics::new()?;
    if let Some(addr) = args.metrics_addr {
        let metrics = metrics.clone();
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_metrics(addr, metrics, token).await {
                warn!(%addr, error = %err, "metrics endpoint stopped");
            }
        });
    }

    // 4) resource manager client + bridge
    let rm = Arc::new(YarnApi::new(YarnApiConfig::from_cluster(&conf))?);
    let bridge_cfg = BridgeConfig::from_cluster(&conf, args.knit_home.clone());
    let ctl_cfg = ControllerConfig {
        launch_artifact: Some(bridge_cfg.jar_path()),
        ..ControllerConfig::from_cluster(&conf)
    };
    let launcher = Arc::new(BootstrapBridge::new(bridge_cfg));

    // 5) registry + controller
    let registry = AppRegistry::new();
    let hook = registry.install_signal_hook(token.clone());
    let controller = AppController::builder(ctl_cfg, rm, launcher)
        .filesystem(Arc::new(WebHdfs::from_cluster(&conf)?))
        .metrics(Arc::new(metrics.clone()))
        .build(&registry);

    let app_id = match controller.start(args.launch_spec(&conf)).await {
        Ok(id) => id,
        Err(err) => {
            registry.shutdown_all().await;
            token.cancel();
            return Err(err).context("launch failed");
        }
    };
    info!(%app_id, controller = %controller, "waiting for completion");

    // 6) wait
    let finished = tokio::select! {
        done = controller.wait_for_completion(Duration::from_secs(args.wait_secs)) => Some(done),
        _ = token.cancelled() => None,
    };

    let Some(finished) = finished else {
        // The signal hook already swept the registry.
        let _ = hook.await;
        bail!("interrupted");
    };

    if finished {
        let status = controller.status().await?;
        info!(%app_id, state = %status.state, final_status = ?status.final_status, "application done");
        match controller.logs(false).await {
            Ok(bundle) => println!("{bundle}"),
            Err(err) => warn!(%app_id, error = %err, "logs unavailable"),
        }
    } else {
        warn!(%app_id, wait_secs = args.wait_secs, "gave up waiting");
    }

    // 7) cleanup
    let killed = registry.shutdown_all().await;
    token.cancel();
    let _ = hook.await;
    info!(killed, "shutdown complete");
    Ok(())
}

async fn serve_metrics(
    addr: SocketAddr,
    metrics: PrometheusMetrics,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "metrics endpoint listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;
    Ok(())
}

async fn render_metrics(State(metrics): State<PrometheusMetrics>) -> Response {
    match metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_values_split_on_first_equals() {
        assert_eq!(
            parse_key_val("OPTS=-Xmx1g=x").unwrap(),
            ("OPTS".to_string(), "-Xmx1g=x".to_string())
        );
        assert!(parse_key_val("=x").is_err());
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn flags_build_a_launch_spec() {
        let args = Args::try_parse_from([
            "knit-agentd",
            "--command",
            "python job.py",
            "--containers",
            "3",
            "--memory",
            "512",
            "--file",
            "hdfs://nn/env.zip",
            "--env",
            "A=1",
            "--no-checks",
            "--knit-home",
            "/opt/knit",
        ])
        .unwrap();
        let conf = ClusterConfig::from_overrides(Overrides {
            queue: Some("batch".into()),
            ..Default::default()
        })
        .unwrap();

        let spec = args.launch_spec(&conf);
        assert_eq!(spec.containers.count, 3);
        assert_eq!(spec.containers.memory_mb, 512);
        assert_eq!(spec.queue, "batch");
        assert_eq!(spec.files, vec!["hdfs://nn/env.zip".to_string()]);
        assert_eq!(spec.env.unwrap().get("A"), Some("1"));
        assert!(!spec.checks);
    }
}
