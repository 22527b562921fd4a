use crate::config::runtime::RuntimeConfig;
use crate::core::image::ImageLayout;
use crate::core::installer::expand_placeholders;
use crate::domain::model::ImageConfig;
use crate::utils::error::{BootstrapError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::{Child, Command};

/// Everything needed to start the image's process, resolved and checked.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub env: BTreeMap<String, String>,
    pub runtime: RuntimeConfig,
}

/// Resolves the launch of a built image.
///
/// Start-time overrides replace image variables of the same name. The
/// runtime record is rebuilt from the resulting environment, so a bad
/// override fails here rather than inside the application.
pub fn prepare_launch(
    layout: &ImageLayout,
    image: &ImageConfig,
    overrides: &[(String, String)],
) -> Result<LaunchPlan> {
    let workdir = layout.workdir(&image.workdir);
    let layer = layout.deps_layer();
    let vars = [("layer", layer.as_path()), ("workdir", workdir.as_path())];

    let mut env: BTreeMap<String, String> = image
        .env
        .iter()
        .map(|(k, v)| (k.clone(), expand_placeholders(v, &vars)))
        .collect();
    for (name, value) in overrides {
        tracing::debug!("Overriding {} at start time", name);
        env.insert(name.clone(), value.clone());
    }

    let runtime = RuntimeConfig::from_vars(&image.env_names, |name| env.get(name).cloned())?;
    if !image.exposed_ports.contains(&runtime.port()) {
        tracing::warn!(
            "⚠️  Port {} is not among the exposed ports {:?}",
            runtime.port(),
            image.exposed_ports
        );
    }

    let entry_point = workdir.join(runtime.entry_point());
    if !entry_point.is_file() {
        return Err(BootstrapError::EntryPointMissing {
            entry_point: runtime.entry_point().clone(),
            workdir,
        });
    }

    let mut argv = image.command.iter().map(|arg| expand_placeholders(arg, &vars));
    let program = argv.next().ok_or_else(|| BootstrapError::MissingConfigError {
        field: "launch.command".to_string(),
    })?;
    let program = resolve_program(&program, &workdir);

    Ok(LaunchPlan {
        program,
        args: argv.collect(),
        workdir,
        env,
        runtime,
    })
}

// 含路徑分隔符的相對路徑以工作目錄為基準，其餘交給 PATH 搜尋
fn resolve_program(program: &str, workdir: &Path) -> String {
    let path = Path::new(program);
    if program.contains('/') && path.is_relative() {
        workdir.join(path).to_string_lossy().into_owned()
    } else {
        program.to_string()
    }
}

/// Starts the process in the foreground and waits for it.
///
/// SIGTERM, SIGINT and SIGHUP received while waiting are forwarded to the
/// process, so it never outlives the bootstrap. Returns the child's exit
/// code unchanged.
pub async fn launch(plan: &LaunchPlan) -> Result<i32> {
    tracing::info!(
        "🚀 Starting '{} {}' in {} (bound to {})",
        plan.program,
        plan.args.join(" "),
        plan.workdir.display(),
        plan.runtime.socket_addr()
    );

    // 先註冊訊號，避免子行程啟動後、監聽前的空窗
    let mut signals = ForwardedSignals::register()?;

    let mut child = Command::new(&plan.program)
        .args(&plan.args)
        .current_dir(&plan.workdir)
        .envs(&plan.env)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| BootstrapError::SpawnFailed {
            program: plan.program.clone(),
            source,
        })?;

    let status = signals.wait(&mut child).await?;
    let code = exit_code_of(status);
    tracing::info!("Process exited with code {}", code);
    Ok(code)
}

#[cfg(unix)]
struct ForwardedSignals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ForwardedSignals {
    fn register() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn wait(&mut self, child: &mut Child) -> Result<ExitStatus> {
        loop {
            let signal = tokio::select! {
                status = child.wait() => return Ok(status?),
                _ = self.terminate.recv() => libc::SIGTERM,
                _ = self.interrupt.recv() => libc::SIGINT,
                _ = self.hangup.recv() => libc::SIGHUP,
            };
            forward_signal(child, signal);
        }
    }
}

#[cfg(unix)]
fn forward_signal(child: &Child, signal: libc::c_int) {
    let Some(pid) = child.id() else {
        return;
    };
    tracing::info!("📨 Forwarding signal {} to process {}", signal, pid);
    // SAFETY: kill() only takes plain integers; pid is our own unreaped child
    let ret = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if ret != 0 {
        tracing::warn!(
            "⚠️  Could not forward signal {}: {}",
            signal,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
struct ForwardedSignals;

#[cfg(not(unix))]
impl ForwardedSignals {
    fn register() -> Result<Self> {
        Ok(Self)
    }

    async fn wait(&mut self, child: &mut Child) -> Result<ExitStatus> {
        Ok(child.wait().await?)
    }
}

/// Exit code of a finished process; death by signal maps to `128 + signal`.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
