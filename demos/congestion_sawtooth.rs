//! Watch `cwnd` climb through slow start, settle into congestion
//! avoidance's linear growth, then saw back down on loss.

use std::time::Duration;

use bytes::Bytes;
use rdt_sim::prelude::*;

#[tokio::main]
async fn main() {
    rdt_sim::logging::init_dev_logging();

    let lossy = LinkConfig::new(0.05, 20.0, 2.0, 0.0, 0.0).expect("probabilities in range");
    let config = EndpointConfig::builder()
        .enable_congestion_control(true)
        .congestion_constants(65_535.0, 1.0, 1.0, 0.5)
        .build()
        .expect("builder produces a valid config");

    let channel = Channel::new(Link::new(lossy), Link::new(LinkConfig::noiseless()), config, config, true)
        .expect("config validates");

    for i in 0..200u32 {
        let msg = format!("seg-{i}");
        loop {
            if channel.endpoint_a().send_data(Bytes::from(msg.clone())) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        if i % 20 == 0 {
            let stats = channel.endpoint_a().get_statistics();
            println!(
                "sent={i} cwnd={:.2} ssthresh={:.2}",
                stats.congestion_control.cwnd, stats.congestion_control.ssthresh
            );
        }
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    let stats = channel.endpoint_a().get_statistics();
    println!("final cwnd={:.2} ssthresh={:.2}", stats.congestion_control.cwnd, stats.congestion_control.ssthresh);
}
