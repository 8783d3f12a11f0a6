pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        identity_url: String,
        resolve_timeout_ms: u64,
    },
}
