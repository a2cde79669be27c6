// ABOUTME: CLI commands for atom image management (build, delete, list)
// ABOUTME: Drives the atom catalog through the configured container engine

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use gravelbox_sandbox::AtomCatalog;

#[derive(Subcommand)]
pub enum AtomsCommands {
    /// Build an atom image from the configured atom directory
    Build {
        /// Atom name, the image is tagged with the image prefix
        name: String,
    },
    /// Delete an atom image
    Delete {
        /// Atom name
        name: String,
    },
    /// List atom images
    List,
}

impl AtomsCommands {
    pub async fn execute(&self, catalog: &AtomCatalog) -> Result<()> {
        match self {
            AtomsCommands::Build { name } => {
                println!("{} {}", "Building atom".blue(), name.bold());
                let log = catalog
                    .build(name)
                    .await
                    .with_context(|| format!("Failed to build atom '{}'", name))?;
                println!("{}", log.dimmed());
                println!(
                    "{} {}",
                    "Built".green().bold(),
                    catalog.image_for(name)
                );
            }
            AtomsCommands::Delete { name } => {
                catalog
                    .delete(name)
                    .await
                    .with_context(|| format!("Failed to delete atom '{}'", name))?;
                println!("{} {}", "Deleted".green().bold(), name);
            }
            AtomsCommands::List => list_atoms(catalog).await?,
        }
        Ok(())
    }
}

async fn list_atoms(catalog: &AtomCatalog) -> Result<()> {
    let atoms = catalog.list().await.context("Failed to list atoms")?;

    if atoms.is_empty() {
        println!("{}", "No atoms found".yellow());
        println!(
            "{}",
            "Use 'gravelbox atoms build <name>' to build your first atom".dimmed()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Name", "Image", "Tag", "ID", "Created", "Size"]);
    for atom in &atoms {
        table.add_row(vec![
            atom.name.as_str(),
            atom.repository.as_str(),
            atom.tag.as_str(),
            atom.image_id.as_str(),
            atom.created.as_str(),
            atom.size.as_str(),
        ]);
    }

    println!("{table}");
    Ok(())
}
