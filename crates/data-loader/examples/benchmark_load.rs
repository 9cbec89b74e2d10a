use data_loader::{Dataset, FileSystemSource};
use std::time::Instant;

fn main() {
    let source = FileSystemSource::from_model_dir("backend/data");

    println!("Loading model and tables from {:?}...\n", source.model_dir);

    let start = Instant::now();
    let dataset = Dataset::load(&source, &source, &source)
        .expect("Failed to load dataset");
    let elapsed = start.elapsed();

    let (users, items, entries, interactions) = dataset.counts();

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Users: {}", users);
    println!("Items: {} (k = {})", items, dataset.model.dim());
    println!("Catalog entries: {}", entries);
    println!("Interactions: {}", interactions);
    println!("\nPerformance: {:.0} interactions/second",
             interactions as f64 / elapsed.as_secs_f64());
}
