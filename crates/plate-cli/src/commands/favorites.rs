//! Saved tax/tip combination commands

use anyhow::Result;
use plate_core::FavoritesStore;

use super::favorite_index;

pub fn cmd_favorites_list(store: &FavoritesStore) -> Result<()> {
    if store.list().is_empty() {
        println!("No saved tax/tip combinations.");
        println!("Save one with: plate favorites save <tax> <tip>");
        return Ok(());
    }

    println!("Saved tax/tip combinations:\n");
    println!("{:>3}  {:>8}  {:>5}", "#", "TAX", "TIP");
    println!("{}", "-".repeat(20));
    for (i, favorite) in store.list().iter().enumerate() {
        println!("{:>3}  {:>7.2}%  {:>4}%", i + 1, favorite.tax, favorite.tip);
    }
    println!();
    println!("File: {}", store.path().display());
    Ok(())
}

pub fn cmd_favorites_save(store: &mut FavoritesStore, tax: f64, tip: u8) -> Result<()> {
    if store.add(tax, tip)? {
        println!("✓ Saved tax {:.2}% with tip {}%", tax, tip);
    } else {
        println!("Tax {:.2}% with tip {}% is already saved", tax, tip);
    }
    Ok(())
}

pub fn cmd_favorites_apply(store: &FavoritesStore, number: usize) -> Result<()> {
    let favorite = store.get(favorite_index(number)?)?;
    println!(
        "Tip {}% (saved with tax {:.2}%)",
        favorite.tip, favorite.tax
    );
    println!("Use it with: --favorite {}", number);
    Ok(())
}

pub fn cmd_favorites_remove(store: &mut FavoritesStore, number: usize) -> Result<()> {
    let removed = store.remove(favorite_index(number)?)?;
    println!(
        "✓ Removed tax {:.2}% with tip {}%",
        removed.tax, removed.tip
    );
    Ok(())
}
