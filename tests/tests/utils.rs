use mock_service::prelude::*;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use taskload::prelude::*;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("taskload=debug,mock_service=info")
            .init();
    });
}

/// Short two-stage run against `addr`: 2 VUs, then 3.
#[allow(unused)]
pub fn quick_config(addr: SocketAddr) -> RunConfig {
    let mut config = RunConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_stages(vec![
            Stage::new(2, Duration::from_millis(500)),
            Stage::new(3, Duration::from_millis(500)),
        ])
        .with_seed(1234);
    config.ramp = RampKind::Step;
    config.iteration_sleep = Duration::from_millis(50);
    config.request_timeout = Some(Duration::from_secs(2));
    config.graceful_stop = Duration::from_secs(2);
    config
}

#[allow(unused)]
pub async fn run_against(config: MockConfig) -> (RunStatistics, MockService) {
    init();
    let (addr, mock) = spawn(config).await.unwrap();
    let stats = LoadDriver::new(quick_config(addr))
        .unwrap()
        .run()
        .await
        .unwrap();
    (stats, mock)
}
