use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{Dataset, FileSystemSource, ItemId, MetadataEntry, UserId};
use ranking::Normalization;
use server::{Recommendation, RecommendationService, ServiceConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::debug;

/// ReelRecs - Movie Recommendation Engine
#[derive(Parser)]
#[command(name = "reel-recs")]
#[command(about = "Movie recommendations from a trained latent-factor model", long_about = None)]
struct Cli {
    /// Directory holding the model arrays and identifier maps
    #[arg(short, long, default_value = "backend/data")]
    model_dir: PathBuf,

    /// Directory holding the movie and rating tables [default: <model-dir>/processed]
    #[arg(short, long)]
    processed_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get movie recommendations for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..=50))]
        limit: u16,

        /// Rescale scores onto the 1-5 rating scale
        #[arg(long)]
        normalize: bool,

        /// Show how each score is made up
        #[arg(long)]
        explain: bool,
    },

    /// Show the movies a user has already rated
    User {
        /// User ID to display
        #[arg(long)]
        user_id: UserId,
    },

    /// Search for movies by title
    Search {
        /// Movie title to search for (case-insensitive substring match)
        #[arg(long)]
        title: String,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value_t = 100)]
        requests: usize,

        /// Number of requests in flight at once
        #[arg(long, default_value_t = 10)]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let source = match &cli.processed_dir {
        Some(processed_dir) => FileSystemSource::new(&cli.model_dir, processed_dir),
        None => FileSystemSource::from_model_dir(&cli.model_dir),
    };

    // Load the model and tables (this may take a moment)
    println!("Loading model from {}...", cli.model_dir.display());
    let start = Instant::now();
    let dataset = Arc::new(
        Dataset::load(&source, &source, &source).context("Failed to load the model and data tables")?,
    );
    let (users, items, _, interactions) = dataset.counts();
    println!(
        "{} Loaded {} users, {} movies and {} ratings in {:?}",
        "✓".green(),
        users,
        items,
        interactions,
        start.elapsed()
    );

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            user_id,
            limit,
            normalize,
            explain,
        } => handle_recommend(dataset, user_id, usize::from(limit), normalize, explain)?,
        Commands::User { user_id } => handle_user(&dataset, user_id)?,
        Commands::Search { title } => handle_search(&dataset, &title)?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(dataset, requests, concurrent).await?,
    }

    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(
    dataset: Arc<Dataset>,
    user_id: UserId,
    limit: usize,
    normalize: bool,
    explain: bool,
) -> Result<()> {
    let config = ServiceConfig {
        normalization: if normalize {
            Normalization::rating_scale()
        } else {
            Normalization::None
        },
        ..ServiceConfig::default()
    };
    let service = RecommendationService::new(Arc::clone(&dataset), config)?;
    if !service.knows_user(user_id) {
        println!(
            "{}",
            format!("User {} is not in the model, no recommendations.", user_id).yellow()
        );
        return Ok(());
    }

    let recommendations = service.get_recommendations(user_id, limit)?;

    print_recommendations(&recommendations);
    if explain {
        print_explanations(&dataset, user_id, &recommendations, normalize)?;
    }
    Ok(())
}

/// Handle the 'user' command
fn handle_user(dataset: &Dataset, user_id: UserId) -> Result<()> {
    let seen = dataset.interactions.seen_items(user_id);
    if seen.is_empty() && !dataset.user_ids.contains(user_id) {
        bail!("User {} not found", user_id);
    }

    println!("{}", format!("User ID: {}", user_id).bold().blue());
    println!(
        "{}In model: {}",
        "• ".green(),
        if dataset.user_ids.contains(user_id) { "yes" } else { "no" }
    );
    println!("{}Rated movies: {}", "• ".cyan(), seen.len());

    let movies: Vec<&MetadataEntry> = seen.iter().filter_map(|&id| dataset.catalog.lookup(id)).collect();

    // Genre counts across everything the user rated
    let mut genre_counts: HashMap<&str, usize> = HashMap::new();
    for movie in &movies {
        for genre in &movie.genres {
            *genre_counts.entry(genre.as_str()).or_insert(0) += 1;
        }
    }
    let mut genres: Vec<(&str, usize)> = genre_counts.into_iter().collect();
    genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    println!("Top genres:");
    for (genre, count) in genres.iter().take(5) {
        println!("  - {}: {} movies", genre, count);
    }

    println!("Rated movies:");
    for movie in movies.iter().take(20) {
        println!("  - {} {}", movie.item_id.to_string().dimmed(), movie.title);
    }
    if movies.len() > 20 {
        println!("  ... and {} more", movies.len() - 20);
    }
    Ok(())
}

/// Handle the 'search' command
fn handle_search(dataset: &Dataset, title: &str) -> Result<()> {
    let matches = dataset.catalog.search_title(title);

    println!("{}", format!("Search results for '{}':", title).bold().blue());
    if matches.is_empty() {
        println!("  No movies found");
        return Ok(());
    }
    for movie in matches.iter().take(20) {
        let rating = movie
            .average_rating
            .map(|avg| format!("avg {:.2}", avg))
            .unwrap_or_else(|| "no ratings".to_string());
        println!(
            "{}: {} [{}] {} ({} ratings)",
            movie.item_id,
            movie.title,
            movie.genres.join(", "),
            rating,
            movie.total_ratings
        );
    }
    if matches.len() > 20 {
        println!("  ... {} more matches", matches.len() - 20);
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(dataset: Arc<Dataset>, requests: usize, concurrent: usize) -> Result<()> {
    if requests == 0 {
        bail!("--requests must be at least 1");
    }
    let known_users = dataset.user_ids.external_ids();
    if known_users.is_empty() {
        bail!("The model has no users to benchmark");
    }

    let service = Arc::new(RecommendationService::new(Arc::clone(&dataset), ServiceConfig::default())?);
    let limit = service.config().default_limit;

    // Random known users
    let user_ids: Vec<UserId> = (0..requests)
        .map(|_| known_users[rand::random_range(0..known_users.len())])
        .collect();

    // Spawn every request, letting `concurrent` of them run at once
    let permits = Arc::new(Semaphore::new(concurrent.max(1)));
    let wall_clock = Instant::now();
    let mut handles = Vec::with_capacity(requests);
    for user_id in user_ids {
        let service = Arc::clone(&service);
        let permits = Arc::clone(&permits);
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let start = Instant::now();
            let recommendations =
                tokio::task::spawn_blocking(move || service.get_recommendations(user_id, limit)).await??;
            debug!("User {}: {} recommendations", user_id, recommendations.len());
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    // Wait for all tasks to complete and collect timings
    let mut timings = Vec::with_capacity(requests);
    for handle in handles {
        timings.push(handle.await??);
    }
    let total_time = wall_clock.elapsed();
    timings.sort();

    let latency_sum: Duration = timings.iter().sum();
    let avg_latency = latency_sum / timings.len() as u32;
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} concurrent)", requests, concurrent.max(1));
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(&timings, 0.50));
    println!("P95 latency: {:?}", percentile(&timings, 0.95));
    println!("P99 latency: {:?}", percentile(&timings, 0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Nearest-rank percentile of sorted, non-empty timings
fn percentile(sorted: &[Duration], fraction: f64) -> Duration {
    let rank = (sorted.len() as f64 * fraction).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Format and print recommendations
fn print_recommendations(recommendations: &[Recommendation]) {
    println!("{}", "Movie Recommendations:".bold().blue());
    if recommendations.is_empty() {
        println!("  Nothing left to recommend");
        return;
    }

    for (rank, rec) in recommendations.iter().enumerate() {
        let rating = rec
            .average_rating
            .map(|avg| format!("avg {:.2} from {}", avg, rec.total_ratings))
            .unwrap_or_else(|| "unrated".to_string());
        println!(
            "{}. {} [{}] - Score: {:.3} ({})",
            (rank + 1).to_string().green(),
            rec.title,
            rec.genres.join(", "),
            rec.score,
            rating.dimmed()
        );
    }
}

/// Print each recommendation's score split into its terms
fn print_explanations(
    dataset: &Dataset,
    user_id: UserId,
    recommendations: &[Recommendation],
    normalized: bool,
) -> Result<()> {
    let user_idx = dataset.user_ids.to_internal(user_id)?;

    println!();
    println!("{}", "Score breakdown (global + user bias + item bias + factors):".bold());
    for rec in recommendations {
        let terms = explain_item(dataset, user_idx, rec.item_id)?;
        println!(
            "  {}: {:.3} {:+.3} {:+.3} {:+.3} = {:.3}",
            rec.item_id,
            terms.global_bias,
            terms.user_bias,
            terms.item_bias,
            terms.interaction,
            terms.total()
        );
    }
    if normalized {
        println!("  (raw predictions; listed scores are rescaled onto 1-5 per request)");
    }
    Ok(())
}

fn explain_item(dataset: &Dataset, user_idx: usize, item_id: ItemId) -> Result<data_loader::ScoreBreakdown> {
    let item_idx = dataset.item_ids.to_internal(item_id)?;
    Ok(dataset.model.breakdown(user_idx, item_idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_limit_bounds() {
        assert!(Cli::try_parse_from(["reel-recs", "recommend", "--user-id", "1", "--limit", "50"]).is_ok());
        assert!(Cli::try_parse_from(["reel-recs", "recommend", "--user-id", "1", "--limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["reel-recs", "recommend", "--user-id", "1", "--limit", "51"]).is_err());
    }

    #[test]
    fn test_percentile() {
        let timings: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();

        assert_eq!(percentile(&timings, 0.50), Duration::from_millis(50));
        assert_eq!(percentile(&timings, 0.95), Duration::from_millis(95));
        assert_eq!(percentile(&timings, 0.99), Duration::from_millis(99));
        assert_eq!(percentile(&timings[..1], 0.99), Duration::from_millis(1));
    }
}
