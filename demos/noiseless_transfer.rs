//! Send a handful of messages over a perfect channel and print what each
//! side's statistics look like once everything has drained.

use std::time::Duration;

use bytes::Bytes;
use rdt_sim::prelude::*;

#[tokio::main]
async fn main() {
    rdt_sim::logging::init_dev_logging();

    let channel = Channel::new(
        Link::new(LinkConfig::noiseless()),
        Link::new(LinkConfig::noiseless()),
        EndpointConfig::default(),
        EndpointConfig::default(),
        true,
    )
    .expect("default config is always valid");

    for i in 0..20u32 {
        let msg = format!("message-{i}");
        while !channel.endpoint_a().send_data(Bytes::from(msg.clone())) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut received = 0;
    while channel.endpoint_b().recv_app_data().is_some() {
        received += 1;
    }
    println!("delivered {received} messages");
    println!("endpoint A stats: {:#?}", channel.endpoint_a().get_statistics());
    println!("channel stats: {:#?}", channel.get_statistics());
}
