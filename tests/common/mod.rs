//! Shared utilities for integration tests.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use cert_echo::config::EchoConfig;
use cert_echo::lifecycle::startup::{prepare, Prepared};
use cert_echo::{ChainLogger, Shutdown};
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use tokio::task::JoinHandle;

/// In-memory sink shared between the server's chain logger and the test.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Chain log entries, one per logged connection.
    pub fn entries(&self) -> Vec<String> {
        self.contents()
            .split("client cert issuer: ")
            .filter(|s| !s.is_empty())
            .map(|s| format!("client cert issuer: {s}"))
            .collect()
    }
}

/// A running server on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub log: SharedBuffer,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), cert_echo::net::listener::ListenerError>>,
}

/// Config for a loopback server with a self-signed `localhost` identity.
#[allow(dead_code)]
pub fn loopback_config() -> EchoConfig {
    let mut config = EchoConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.identity.hostname = Some("localhost".to_string());
    config
}

/// Start a server with `config`, logging chains into a shared buffer.
pub async fn start_server(config: EchoConfig) -> TestServer {
    let log = SharedBuffer::default();
    let observer = Arc::new(ChainLogger::new(Box::new(log.clone())));

    let Prepared { server, listener } = prepare(&config, observer).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, rx).await });

    TestServer {
        addr,
        log,
        shutdown,
        handle,
    }
}

/// An arbitrary self-signed client certificate, trusted by nobody.
/// Returns the PEM bundle and the certificate DER.
#[allow(dead_code)]
pub fn stranger_identity(common_name: &str) -> (String, Vec<u8>) {
    let key = KeyPair::generate().unwrap();
    let cert = params_named(common_name).self_signed(&key).unwrap();

    (
        format!("{}{}", cert.pem(), key.serialize_pem()),
        cert.der().to_vec(),
    )
}

fn params_named(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params
}

/// A client leaf issued by an intermediate, which is in turn issued by a
/// root. The bundle carries leaf, intermediate and the leaf key, in that
/// order. Returns the bundle and the DER of leaf and intermediate.
#[allow(dead_code)]
pub fn chained_identity(leaf_name: &str) -> (String, Vec<Vec<u8>>) {
    let root_key = KeyPair::generate().unwrap();
    let mut root_params = params_named("Echo Test Root");
    root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let root = root_params.self_signed(&root_key).unwrap();

    let intermediate_key = KeyPair::generate().unwrap();
    let mut intermediate_params = params_named("Echo Test Intermediate");
    intermediate_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let intermediate = intermediate_params
        .signed_by(&intermediate_key, &root, &root_key)
        .unwrap();

    let leaf_key = KeyPair::generate().unwrap();
    let leaf = params_named(leaf_name)
        .signed_by(&leaf_key, &intermediate, &intermediate_key)
        .unwrap();

    (
        format!("{}{}{}", leaf.pem(), intermediate.pem(), leaf_key.serialize_pem()),
        vec![leaf.der().to_vec(), intermediate.der().to_vec()],
    )
}

/// HTTPS client that skips server verification and resolves `localhost`
/// to the test server. `identity_pem` is the client certificate + key.
pub fn https_client(addr: SocketAddr, identity_pem: Option<&str>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .danger_accept_invalid_certs(true)
        .resolve("localhost", addr)
        .pool_max_idle_per_host(0)
        .no_proxy();

    if let Some(pem) = identity_pem {
        builder = builder.identity(reqwest::Identity::from_pem(pem.as_bytes()).unwrap());
    }

    builder.build().unwrap()
}
