//! Session lifecycle as seen through the pool: lazy connect, reuse across
//! acquisitions, and command outcome reporting.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use headnode_pool::{
    Connection, Connector, ConnectionPool, ExecResult, PoolConfig, PoolError, Result,
};

/// Connection whose exec results are scripted per command.
struct ScriptedConn {
    script: Arc<HashMap<String, ExecResult>>,
}

#[async_trait]
impl Connection for ScriptedConn {
    async fn exec(&self, command: &str) -> Result<ExecResult> {
        self.script
            .get(command)
            .cloned()
            .ok_or_else(|| PoolError::Exec {
                reason: format!("unscripted command: {command}"),
            })
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct ScriptedConnector {
    connects: Arc<AtomicUsize>,
    script: Arc<HashMap<String, ExecResult>>,
}

impl ScriptedConnector {
    fn new(script: HashMap<String, ExecResult>) -> Self {
        Self {
            connects: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(script),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Conn = ScriptedConn;

    async fn connect(&self, _config: &PoolConfig) -> Result<Self::Conn> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedConn {
            script: self.script.clone(),
        })
    }
}

fn config(max_connections: usize) -> PoolConfig {
    toml::from_str(&format!(
        r#"
        user = "alice"
        host = "head.cluster.example"
        key_path = "/keys/id"
        max_connections = {max_connections}
        "#
    ))
    .unwrap()
}

fn sbatch_script() -> HashMap<String, ExecResult> {
    let mut script = HashMap::new();
    script.insert(
        "sbatch job.sh".to_string(),
        ExecResult {
            stdout: vec!["Submitted batch job 4242".to_string()],
            stderr: vec!["sbatch: queue nearly full".to_string()],
            combined: vec![
                "sbatch: queue nearly full".to_string(),
                "Submitted batch job 4242".to_string(),
            ],
            exit_code: 0,
        },
    );
    script.insert(
        "scancel 9999".to_string(),
        ExecResult {
            stderr: vec!["scancel: error: Invalid job id 9999".to_string()],
            combined: vec!["scancel: error: Invalid job id 9999".to_string()],
            exit_code: 1,
            ..Default::default()
        },
    );
    script
}

#[tokio::test]
async fn test_exec_reports_streams_separately_and_merged() {
    let pool = ConnectionPool::new(config(1), ScriptedConnector::new(sbatch_script()));

    let result = pool
        .with_session(|session| async move { session.exec("sbatch job.sh").await })
        .await
        .unwrap();

    assert_eq!(result.stdout, vec!["Submitted batch job 4242"]);
    assert_eq!(result.stderr, vec!["sbatch: queue nearly full"]);
    assert_eq!(result.combined.len(), 2);
    assert!(result.success());
}

#[tokio::test]
async fn test_sessions_keep_connections_across_acquisitions() {
    let connector = ScriptedConnector::new(sbatch_script());
    let connects = connector.connects.clone();
    let pool = ConnectionPool::new(config(1), connector);

    for _ in 0..5 {
        pool.with_session(|session| async move { session.exec("sbatch job.sh").await })
            .await
            .unwrap();
    }

    // One slot, one connection, five acquisitions.
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_each_slot_connects_independently() {
    let connector = ScriptedConnector::new(sbatch_script());
    let connects = connector.connects.clone();
    let pool = Arc::new(ConnectionPool::new(config(3), connector));

    // Hold all three slots at once so each one has to connect.
    let barrier = Arc::new(tokio::sync::Barrier::new(3));
    let mut handles = Vec::new();
    for _ in 0..3 {
        let pool = pool.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            pool.with_session(|session| async move {
                let result = session.exec("sbatch job.sh").await;
                barrier.wait().await;
                result
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(connects.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exec_checked_through_the_pool() {
    let pool = ConnectionPool::new(config(1), ScriptedConnector::new(sbatch_script()));

    let err = pool
        .with_session(|session| async move { session.exec_checked("scancel 9999").await })
        .await
        .unwrap_err();

    match err {
        PoolError::CommandFailed {
            user,
            host,
            command,
            exit_code,
            output,
        } => {
            assert_eq!(user, "alice");
            assert_eq!(host, "head.cluster.example");
            assert_eq!(command, "scancel 9999");
            assert_eq!(exit_code, 1);
            assert!(output.contains("Invalid job id 9999"));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_failure_propagates_and_frees_the_slot() {
    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        type Conn = ScriptedConn;

        async fn connect(&self, config: &PoolConfig) -> Result<Self::Conn> {
            Err(PoolError::Connection {
                user: config.user.clone(),
                host: config.host.clone(),
                port: config.port,
                log: "dialing head.cluster.example:22\nconnection refused".to_string(),
            })
        }
    }

    let pool = ConnectionPool::new(config(1), RefusingConnector);

    let err = pool
        .with_session(|session| async move { session.exec("squeue").await })
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Connection { .. }));
    assert!(err.to_string().contains("connection refused"));

    assert_eq!(pool.available(), 1);
}
