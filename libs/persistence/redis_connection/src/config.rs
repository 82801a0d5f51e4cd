pub trait DbConnectConfig: serde::de::DeserializeOwned {
    #[allow(unused)]
    fn password(&self) -> Option<&str> { None }
    fn host(&self) -> &str;
    fn port(&self) -> u16;
    fn db(&self) -> u8;
}

#[derive(Debug, serde::Deserialize)]
pub struct RedisDbConfig {
    #[serde(default = "host_default")]
    pub host: String,
    #[serde(default = "port_default")]
    pub port: u16,
    #[serde(default = "db_default")]
    pub db: u8,
}

impl DbConnectConfig for RedisDbConfig {
    fn password(&self) -> Option<&str> { None }

    fn host(&self) -> &str { &self.host }

    fn port(&self) -> u16 { self.port }

    fn db(&self) -> u8 { self.db }
}

fn host_default() -> String { "127.0.0.1".into() }
fn port_default() -> u16 { 6379 }
fn db_default() -> u8 { 0 }
