use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "likeness", about = "Likeness face registry CLI")]
struct Cli {
    /// Base URL of the likenessd daemon
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new person
    Add {
        /// Person's display name
        name: String,
    },
    /// List registered people
    List {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show one person with their reference photos
    Show { id: i64 },
    /// Rename a person
    Rename { id: i64, name: String },
    /// Remove a person and all their photos
    Remove { id: i64 },
    /// Upload a reference photo for a person
    Enroll {
        person_id: i64,
        /// Path to a JPEG/PNG photo containing one face
        photo: PathBuf,
    },
    /// Identify a face against stored references
    Identify {
        photo: PathBuf,
        /// Limit the search to one person
        #[arg(long)]
        person: Option<i64>,
    },
    /// Show system statistics
    Stats,
    /// Check daemon health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let url = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Add { name } => {
            let body = expect_ok(
                client
                    .post(format!("{url}/api/persons"))
                    .json(&serde_json::json!({ "name": name }))
                    .send()
                    .await?,
            )
            .await?;
            println!("registered person #{} ({})", body["id"], body["name"]);
        }
        Commands::List { limit, offset } => {
            let body = expect_ok(
                client
                    .get(format!("{url}/api/persons?limit={limit}&offset={offset}"))
                    .send()
                    .await?,
            )
            .await?;
            let persons = body.as_array().cloned().unwrap_or_default();
            if persons.is_empty() {
                println!("no people registered");
            }
            for person in persons {
                println!("{:>5}  {}", person["id"], person["name"].as_str().unwrap_or("?"));
            }
        }
        Commands::Show { id } => {
            let body =
                expect_ok(client.get(format!("{url}/api/persons/{id}")).send().await?).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Rename { id, name } => {
            let body = expect_ok(
                client
                    .put(format!("{url}/api/persons/{id}"))
                    .json(&serde_json::json!({ "name": name }))
                    .send()
                    .await?,
            )
            .await?;
            println!("renamed person #{} to {}", body["id"], body["name"]);
        }
        Commands::Remove { id } => {
            expect_ok(
                client
                    .delete(format!("{url}/api/persons/{id}"))
                    .send()
                    .await?,
            )
            .await?;
            println!("removed person #{id}");
        }
        Commands::Enroll { person_id, photo } => {
            let form = photo_form(&photo).await?;
            let body = expect_ok(
                client
                    .post(format!("{url}/api/persons/{person_id}/photos"))
                    .multipart(form)
                    .send()
                    .await?,
            )
            .await?;
            println!(
                "stored photo #{} for person #{person_id} (confidence {})",
                body["id"], body["confidence"]
            );
        }
        Commands::Identify { photo, person } => {
            let mut form = photo_form(&photo).await?;
            if let Some(person_id) = person {
                form = form.text("person_id", person_id.to_string());
            }
            let body = expect_ok(
                client
                    .post(format!("{url}/api/identify"))
                    .multipart(form)
                    .send()
                    .await?,
            )
            .await?;
            if body["matched"].as_bool().unwrap_or(false) {
                println!(
                    "match: {} (person #{}, similarity {})",
                    body["person_name"].as_str().unwrap_or("?"),
                    body["person_id"],
                    body["similarity"]
                );
                if let Some(photo_id) = body["auto_trained_photo_id"].as_i64() {
                    println!("auto-training stored the probe as reference photo #{photo_id}");
                }
            } else {
                println!("no match (best similarity {})", body["similarity"]);
            }
        }
        Commands::Stats => {
            let body = expect_ok(client.get(format!("{url}/api/stats")).send().await?).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Health => {
            let res = client.get(format!("{url}/api/health")).send().await?;
            let status = res.status();
            let body: Value = res.json().await.unwrap_or(Value::Null);
            println!("{}", serde_json::to_string_pretty(&body)?);
            if !status.is_success() {
                anyhow::bail!("daemon unhealthy ({status})");
            }
        }
    }

    Ok(())
}

/// Build a multipart form with the photo as the `file` part.
async fn photo_form(photo: &Path) -> Result<reqwest::multipart::Form> {
    let bytes = tokio::fs::read(photo)
        .await
        .with_context(|| format!("reading {}", photo.display()))?;
    let filename = photo
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo.jpg".to_string());
    let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);
    Ok(reqwest::multipart::Form::new().part("file", part))
}

/// Unwrap a JSON response, turning API error bodies into readable failures.
async fn expect_ok(res: reqwest::Response) -> Result<Value> {
    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);
    if status.is_success() {
        Ok(body)
    } else {
        let detail = body["error"].as_str().unwrap_or("request failed");
        anyhow::bail!("{status}: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
