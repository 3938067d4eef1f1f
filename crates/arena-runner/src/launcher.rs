use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use arena_core::EngineIdentity;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Whatever keeps an engine alive; killed when the instance goes `Fatal`.
pub enum EngineProcess {
    Child(Child),
    Task(JoinHandle<()>),
}

impl EngineProcess {
    pub fn kill(&mut self) {
        match self {
            EngineProcess::Child(child) => {
                let _ = child.start_kill();
            }
            EngineProcess::Task(task) => task.abort(),
        }
    }
}

/// The pipes of a launched engine.
pub struct EngineIo {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    pub process: EngineProcess,
}

#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, identity: &EngineIdentity) -> Result<EngineIo>;
}

/// Spawns `identity.command` as a child process speaking UCI on stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, identity: &EngineIdentity) -> Result<EngineIo> {
        let mut child = Command::new(&identity.command)
            .args(&identity.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning `{}`", identity.command))?;
        let stdin = child.stdin.take().context("engine stdin is not piped")?;
        let stdout = child.stdout.take().context("engine stdout is not piped")?;
        tracing::debug!(engine = %identity.name, pid = ?child.id(), "spawned engine process");
        Ok(EngineIo {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            process: EngineProcess::Child(child),
        })
    }
}

type ServeFn = Arc<dyn Fn(&EngineIdentity, DuplexStream) -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs an engine inside this process on a `tokio::io::duplex` pair.
#[derive(Clone)]
pub struct InProcessLauncher {
    serve: ServeFn,
}

impl InProcessLauncher {
    pub fn new<F, Fut>(serve: F) -> Self
    where
        F: Fn(&EngineIdentity, DuplexStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            serve: Arc::new(move |identity: &EngineIdentity, io: DuplexStream| {
                serve(identity, io).boxed()
            }),
        }
    }
}

#[async_trait]
impl Launcher for InProcessLauncher {
    async fn launch(&self, identity: &EngineIdentity) -> Result<EngineIo> {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn((self.serve)(identity, theirs));
        let (reader, writer) = tokio::io::split(ours);
        Ok(EngineIo {
            reader: Box::new(reader),
            writer: Box::new(writer),
            process: EngineProcess::Task(task),
        })
    }
}
