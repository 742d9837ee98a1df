use colored::*;
use std::io::{BufRead, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Shared CLI implementation for the `dlg` binary.
pub fn run(args: Vec<String>) -> anyhow::Result<()> {
    let bin = args
        .first()
        .map(|s| s.as_str())
        .unwrap_or("dlg")
        .to_string();

    if args.len() < 2 {
        print_usage(&bin);
        return Ok(());
    }

    let command = &args[1];

    match command.as_str() {
        "send" => {
            if args.len() < 5 {
                eprintln!(
                    "{}",
                    format!("Usage: {} send <your_id> <peer_id> <message>", bin).yellow()
                );
                return Ok(());
            }
            let sender_id = parse_id(&args[2])?;
            let receiver_id = parse_id(&args[3])?;
            let message = args[4..].join(" ");
            send_message(sender_id, receiver_id, message)?;
        }
        "history" => {
            if args.len() < 4 {
                eprintln!(
                    "{}",
                    format!("Usage: {} history <your_id> <peer_id> [after_seq]", bin).yellow()
                );
                return Ok(());
            }
            let user_id = parse_id(&args[2])?;
            let peer_id = parse_id(&args[3])?;
            let after_seq = args.get(4).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
            history(user_id, peer_id, after_seq)?;
        }
        "watch" => {
            if args.len() < 4 {
                eprintln!(
                    "{}",
                    format!("Usage: {} watch <your_id> <peer_id>", bin).yellow()
                );
                return Ok(());
            }
            let user_id = parse_id(&args[2])?;
            let peer_id = parse_id(&args[3])?;
            watch(user_id, peer_id)?;
        }
        "unread" => {
            if args.len() < 3 {
                eprintln!("{}", format!("Usage: {} unread <your_id>", bin).yellow());
                return Ok(());
            }
            let user_id = parse_id(&args[2])?;
            unread(user_id)?;
        }
        "add-user" => {
            if args.len() < 4 {
                eprintln!(
                    "{}",
                    format!("Usage: {} add-user <id> <display_name>", bin).yellow()
                );
                return Ok(());
            }
            let id = parse_id(&args[2])?;
            let display_name = args[3..].join(" ");
            add_user(id, display_name)?;
        }
        "users" => {
            list_users()?;
        }
        "status" => {
            show_status()?;
        }
        _ => {
            eprintln!("{} Unknown command: {}", "✗".red().bold(), command.red());
            print_usage(&bin);
        }
    }

    Ok(())
}

fn parse_id(s: &str) -> anyhow::Result<u64> {
    s.parse::<u64>()
        .map_err(|_| anyhow::anyhow!("user id must be a number, got '{}'", s))
}

fn print_usage(bin: &str) {
    println!("{}", "💬 Dialog CLI".bright_cyan().bold());
    println!();
    println!("{}", "Usage:".bright_white().bold());
    println!("  {} <command> [args]", bin.cyan());
    println!();
    println!("{}", "Commands:".bright_white().bold());
    println!(
        "  {} <your_id> <peer_id> <message>   Send a message",
        "send".cyan()
    );
    println!(
        "  {} <your_id> <peer_id> [seq]    Show conversation history",
        "history".cyan()
    );
    println!(
        "  {} <your_id> <peer_id>            Poll the conversation until interrupted",
        "watch".cyan()
    );
    println!(
        "  {} <your_id>                     Show unread counts per conversation",
        "unread".cyan()
    );
    println!(
        "  {} <id> <display_name>          Register a user in the directory",
        "add-user".cyan()
    );
    println!("  {}                            List registered users", "users".cyan());
    println!("  {}                           Show node status", "status".cyan());
}

fn get_api_port() -> u16 {
    if let Ok(port) = std::env::var("DIALOG_API_PORT") {
        if let Ok(p) = port.parse::<u16>() {
            return p;
        }
    }
    // Port file written by the node on startup
    if let Ok(home) = std::env::var("HOME") {
        let path = std::path::Path::new(&home).join(".dialog_api_port");
        if let Ok(contents) = std::fs::read_to_string(&path) {
            if let Ok(p) = contents.trim().parse::<u16>() {
                return p;
            }
        }
    }
    // Default scheme: 1000 + HTTP port (e.g. 8080 -> 9080)
    // Try the common local range first.
    for port in 9070..=9100 {
        match TcpStream::connect(format!("127.0.0.1:{}", port)) {
            Ok(_) => {
                eprintln!(
                    "{} Connected to API on port {}",
                    "✓".green(),
                    port.to_string().cyan()
                );
                return port;
            }
            Err(_) => continue,
        }
    }
    eprintln!("{}", "✗ Error: Could not find Dialog API server".red().bold());
    eprintln!("  Make sure a node is running and try:");
    eprintln!(
        "  {} {}",
        "-".dimmed(),
        "DIALOG_API_PORT=9080 cargo run --bin dlg -- status".yellow()
    );
    std::process::exit(1);
}

/// One request/response round trip; every call opens a fresh connection.
fn call(api_port: u16, request: serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", api_port))?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    writeln!(stream, "{}", request)?;

    let mut response = String::new();
    std::io::BufReader::new(&stream).read_line(&mut response)?;

    let resp: serde_json::Value = serde_json::from_str(&response)?;
    if resp["success"].as_bool().unwrap_or(false) {
        Ok(resp["data"].clone())
    } else {
        let error = resp["error"].as_str().unwrap_or("Unknown error");
        anyhow::bail!("{}", error)
    }
}

fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn print_message(msg: &serde_json::Value, viewer_id: u64) {
    let seq = msg["seq"].as_u64().unwrap_or(0);
    let sender = msg["senderId"].as_u64().unwrap_or(0);
    let content = msg["content"].as_str().unwrap_or("");
    let time = format_timestamp(msg["createdAt"].as_str().unwrap_or(""));

    let who = if sender == viewer_id {
        "you".cyan()
    } else {
        format!("#{}", sender).green()
    };
    println!(
        "  {} {} {} {}",
        format!("[{}]", seq).dimmed(),
        time.dimmed(),
        who,
        content
    );
}

fn send_message(sender_id: u64, receiver_id: u64, message: String) -> anyhow::Result<()> {
    let api_port = get_api_port();
    let data = match call(
        api_port,
        serde_json::json!({
            "command": "send",
            "sender_id": sender_id,
            "receiver_id": receiver_id,
            "content": message,
        }),
    ) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{} Error: {}", "✗".red().bold(), e.to_string().red());
            std::process::exit(1);
        }
    };

    let seq = data["message"]["seq"].as_u64().unwrap_or(0);
    println!(
        "{} Message sent! seq: {}",
        "✓".green().bold(),
        seq.to_string().cyan()
    );
    Ok(())
}

fn history(user_id: u64, peer_id: u64, after_seq: u64) -> anyhow::Result<()> {
    let api_port = get_api_port();
    let data = match call(
        api_port,
        serde_json::json!({
            "command": "history",
            "user_id": user_id,
            "other_id": peer_id,
            "after_seq": after_seq,
        }),
    ) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{} Error: {}", "✗".red().bold(), e.to_string().red());
            std::process::exit(1);
        }
    };

    let messages = data["messages"].as_array().cloned().unwrap_or_default();
    if messages.is_empty() {
        println!("{}", "No messages".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Conversation with #{} ({} messages)", peer_id, messages.len())
            .bright_cyan()
            .bold()
    );
    println!("{}", "─".repeat(60).dimmed());
    for msg in &messages {
        print_message(msg, user_id);
    }
    Ok(())
}

fn watch(user_id: u64, peer_id: u64) -> anyhow::Result<()> {
    let api_port = get_api_port();
    let interval = std::env::var("DIALOG_POLL_INTERVAL")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(5);

    println!(
        "{}",
        format!(
            "Watching conversation with #{} (every {}s, Ctrl+C to stop)",
            peer_id, interval
        )
        .bright_cyan()
        .bold()
    );

    let mut after_seq = 0u64;
    let mut failures = 0u32;
    loop {
        match call(
            api_port,
            serde_json::json!({
                "command": "history",
                "user_id": user_id,
                "other_id": peer_id,
                "after_seq": after_seq,
            }),
        ) {
            Ok(data) => {
                failures = 0;
                let messages = data["messages"].as_array().cloned().unwrap_or_default();
                if let Some(newest) = messages.last().and_then(|m| m["seq"].as_u64()) {
                    for msg in &messages {
                        print_message(msg, user_id);
                    }
                    // Acknowledge only what was just displayed
                    let _ = call(
                        api_port,
                        serde_json::json!({
                            "command": "mark_read",
                            "user_id": user_id,
                            "interlocutor_id": peer_id,
                            "up_to_seq": newest,
                        }),
                    );
                    after_seq = newest;
                }
            }
            Err(e) => {
                // Any failure is "no update this cycle"; the next tick retries
                failures += 1;
                if failures == 3 {
                    eprintln!(
                        "{} Connection degraded: {}",
                        "⚠".yellow().bold(),
                        e.to_string().yellow()
                    );
                }
            }
        }
        std::thread::sleep(Duration::from_secs(interval));
    }
}

fn unread(user_id: u64) -> anyhow::Result<()> {
    let api_port = get_api_port();
    let data = match call(
        api_port,
        serde_json::json!({ "command": "unread", "user_id": user_id }),
    ) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{} Error: {}", "✗".red().bold(), e.to_string().red());
            std::process::exit(1);
        }
    };

    let total = data["total"].as_u64().unwrap_or(0);
    println!(
        "{}",
        format!("Unread messages: {}", total).bright_cyan().bold()
    );
    if let Some(conversations) = data["conversations"].as_object() {
        for (conversation, count) in conversations {
            let count = count.as_u64().unwrap_or(0);
            let badge = if count > 0 {
                count.to_string().green().bold()
            } else {
                count.to_string().dimmed()
            };
            println!("  {} {}", conversation.cyan(), badge);
        }
    }
    Ok(())
}

fn add_user(id: u64, display_name: String) -> anyhow::Result<()> {
    let api_port = get_api_port();
    match call(
        api_port,
        serde_json::json!({
            "command": "add_user",
            "id": id,
            "display_name": display_name,
        }),
    ) {
        Ok(data) => {
            let name = data["user"]["display_name"].as_str().unwrap_or("?");
            println!(
                "{} User #{} ({}) registered",
                "✓".green().bold(),
                id.to_string().cyan(),
                name
            );
        }
        Err(e) => {
            eprintln!("{} Error: {}", "✗".red().bold(), e.to_string().red());
            std::process::exit(1);
        }
    }
    Ok(())
}

fn list_users() -> anyhow::Result<()> {
    let api_port = get_api_port();
    let data = match call(api_port, serde_json::json!({ "command": "users" })) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{} Error: {}", "✗".red().bold(), e.to_string().red());
            std::process::exit(1);
        }
    };

    let users = data["users"].as_array().cloned().unwrap_or_default();
    if users.is_empty() {
        println!("{}", "No users registered".yellow());
        return Ok(());
    }
    println!(
        "{}",
        format!("Registered users ({})", users.len())
            .bright_cyan()
            .bold()
    );
    println!("{}", "─".repeat(60).dimmed());
    for user in &users {
        let id = user["id"].as_u64().unwrap_or(0);
        let name = user["display_name"].as_str().unwrap_or("?");
        println!("  {} {}", format!("#{}", id).cyan(), name.green());
    }
    Ok(())
}

fn show_status() -> anyhow::Result<()> {
    let api_port = get_api_port();
    let data = match call(api_port, serde_json::json!({ "command": "status" })) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{} Error: {}", "✗".red().bold(), e.to_string().red());
            std::process::exit(1);
        }
    };

    println!(
        "{}",
        "╭─ Dialog Node Status ──────────────────────────────────────────╮".bright_cyan()
    );
    println!(
        "{} {}",
        "│".bright_cyan(),
        format!(
            "Status:   {}",
            data["status"].as_str().unwrap_or("?").green()
        )
        .bright_white()
    );
    println!(
        "{} {}",
        "│".bright_cyan(),
        format!(
            "Messages: {}",
            data["messages"].as_u64().unwrap_or(0).to_string().cyan()
        )
        .bright_white()
    );
    println!(
        "{}",
        "╰───────────────────────────────────────────────────────────────╯".bright_cyan()
    );
    Ok(())
}
