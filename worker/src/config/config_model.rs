#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub identity: Identity,
    pub sweep: Sweep,
    pub notifier: Notifier,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Sweep {
    pub interval_seconds: u64,
    pub batch_limit: Option<i64>,
    pub internal_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    pub webhook_url: Option<String>,
}
