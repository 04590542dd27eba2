use auraflux::{ws::ConnectionStatus, Auraflux};

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let mut app = Auraflux::from_env()
        .map_err(|e| {
            println!("Invalid env config: {}", e);
            std::process::exit(1);
        })
        .unwrap();

    if !app.auth().check_status().await {
        println!("Not logged in, notifications may be rejected by server");
    }

    let mut status = app.socket().status();
    app.start();

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                if current.is_connected() {
                    println!("socket connected, waiting for notifications");
                } else {
                    println!("socket {:?}", current);
                }
                if current == ConnectionStatus::Failed {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    for (event_type, notification) in app.notifications().snapshot() {
        println!("[{}] {}: {}", event_type, notification.title, notification.message);
    }

    app.shutdown();
}
