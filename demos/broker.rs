use anyhow::Result;
use tokio_dbus_wire::{Address, BrokerBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let address = match std::env::args().nth(1) {
        Some(address) => address.parse::<Address>()?,
        None => "unix:path=/tmp/tokio-dbus-wire,listen=1".parse::<Address>()?,
    };

    let broker = BrokerBuilder::new(address).bind().await?;
    println!("DBUS_SESSION_BUS_ADDRESS={}", broker.local_address());

    let close = broker.close_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            close.close();
        }
    });

    broker.run().await?;
    Ok(())
}
