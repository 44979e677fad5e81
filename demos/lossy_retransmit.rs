//! A lossy link forces timeouts and retransmissions; dump the resulting
//! event log to disk so it can be inspected after the run.

use std::time::Duration;

use bytes::Bytes;
use rdt_sim::prelude::*;

#[tokio::main]
async fn main() {
    rdt_sim::logging::init_dev_logging();

    let lossy = LinkConfig::new(0.2, 30.0, 5.0, 0.0, 0.0).expect("probabilities in range");
    let channel = Channel::new(
        Link::new(lossy),
        Link::new(LinkConfig::noiseless()),
        EndpointConfig::default(),
        EndpointConfig::default(),
        true,
    )
    .expect("default config is always valid");

    for i in 0..40u32 {
        let msg = format!("payload-{i}");
        while !channel.endpoint_a().send_data(Bytes::from(msg.clone())) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    tokio::time::sleep(Duration::from_secs(3)).await;

    let stats = channel.endpoint_a().get_statistics();
    println!("retransmissions: {}", stats.retransmissions);
    println!("timeouts: {}", stats.timeouts);
    println!("fast retransmits: {}", stats.fast_retransmits);

    channel
        .endpoint_a()
        .save_logs("lossy_retransmit_endpoint_a.json")
        .expect("log file is writable");
    channel
        .save_logs("lossy_retransmit_channel.json")
        .expect("log file is writable");
}
