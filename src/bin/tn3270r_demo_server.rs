//! Demo TN3270 host
//!
//! Serves a sign-on screen to each client and logs every key it receives.
//! PF3 or Clear ends the session.
//!
//! Usage: tn3270r-demo-server [bind address] (default 127.0.0.1:3270)

use std::thread;

use anyhow::Context;
use tn3270r::{ServerConnection, TNServerScreen, TnServer};

const SIGN_ON: [&str; 8] = [
    "}                          TN3270R DEMO HOST",
    "",
    "]Userid  ===>[        ]",
    "]Password===>~        ]",
    "",
    "]Last key:^      ]",
    "",
    "]Enter to sign on, PF3 to exit",
];

fn serve(mut connection: ServerConnection) -> anyhow::Result<()> {
    let mut screen: TNServerScreen = connection.create_screen();
    screen.format(&SIGN_ON);
    screen.set_cursor(14, 2);
    let mut last_key = String::new();

    loop {
        if !last_key.is_empty() {
            let mut lines: Vec<String> = SIGN_ON.iter().map(|line| line.to_string()).collect();
            lines[5] = format!("]Last key:^{:<6}]", last_key);
            let user = screen.input_text(0).unwrap_or_default();
            let password = screen.input_text(1).unwrap_or_default();
            screen.format(&lines);
            screen.set_input_text(0, &user);
            screen.set_input_text(1, &password);
            screen.set_cursor(14, 2);
        }
        connection.send(&screen).context("sending screen")?;

        let key = connection.wait_for_key(&mut screen).context("waiting for key")?;
        log::info!(
            "{}: {} userid={:?}",
            connection.lu_name().unwrap_or("client"),
            key,
            screen.input_text(0).unwrap_or_default()
        );
        if key == "PF3" || key == "Clear" {
            connection.close();
            return Ok(());
        }
        last_key = key;
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let bind = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:3270".to_string());
    let server = TnServer::listen(bind.as_str()).with_context(|| format!("binding {}", bind))?;
    println!("tn3270r demo host on {}", server.local_addr()?);

    loop {
        match server.accept() {
            Ok(connection) => {
                thread::spawn(move || {
                    if let Err(e) = serve(connection) {
                        log::warn!("session ended: {:#}", e);
                    }
                });
            }
            Err(e) => log::warn!("negotiation failed: {}", e),
        }
    }
}
