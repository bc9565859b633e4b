//! Auth command handlers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use ntm_core::app::App;
use ntm_core::storage::mask_token;

pub async fn send_code(app: &App, email: &str) -> Result<()> {
    let message = app
        .auth()
        .send_code(email)
        .await
        .context("Failed to send login code")?;
    app.toasts().success(message.message);
    Ok(())
}

pub async fn login(app: &App, email: &str, code: Option<&str>) -> Result<()> {
    let code = match code {
        Some(code) => code.trim().to_string(),
        None => {
            send_code(app, email).await?;
            read_code(email)?
        }
    };
    if code.is_empty() {
        bail!("No login code entered");
    }

    app.auth()
        .verify_code(email, &code)
        .await
        .context("Login failed")?;

    let shown = app.auth().user().map_or_else(|| email.to_string(), |user| user.email);
    app.toasts().success(format!("Logged in as {shown}"));
    Ok(())
}

fn read_code(email: &str) -> Result<String> {
    eprint!("Enter the code sent to {email}: ");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read login code")?;
    Ok(input.trim().to_string())
}

pub async fn logout(app: &App) -> Result<()> {
    if !app.auth().is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }
    app.auth().logout().await;
    app.toasts().success("Logged out");
    Ok(())
}

pub async fn whoami(app: &App) -> Result<()> {
    let token = app.auth().token();
    if !app.auth().validate_token().await {
        println!("Not logged in.");
        return Ok(());
    }

    let Some(user) = app.auth().user() else {
        bail!("Token is valid but the profile could not be loaded");
    };
    println!("{} (id {})", user.email, user.id);
    if let Some(token) = token {
        println!("token: {}", mask_token(&token));
    }
    if let Some(last_login) = user.last_login {
        println!("last login: {}", last_login.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}
