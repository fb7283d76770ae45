use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, info_span, trace};

use pheno_cli::logging::redact_value;
use pheno_cli::output::{open_output, write_events_csv, write_first_events_csv};
use pheno_core::{
    ExtractOptions, ExtractOutcome, Extractor, earliest_per_phenotype, first_events,
};
use pheno_extract::{FrameSource, Overrides, birth_dates};
use pheno_model::Predicate;
use pheno_standards::{Catalogue, PhenotypeQuery, definitions_root};
use pheno_store::{EventColumn, EventStore, MemoryEventStore, SqliteEventStore};

use crate::cli::{ExtractArgs, FirstEventsArgs, ListArgs};
use crate::summary::{category_table, detail_table, phenotype_table, print_extract_summary};

pub fn load_catalogue(definitions: Option<&Path>) -> Result<Catalogue> {
    let dir = definitions.map_or_else(definitions_root, Path::to_path_buf);
    let catalogue = Catalogue::load(&dir)
        .with_context(|| format!("load phenotype definitions from {}", dir.display()))?;
    info!(dir = %dir.display(), phenotypes = catalogue.len(), "loaded catalogue");
    Ok(catalogue)
}

/// Names to extract: the requested ones, or the whole catalogue.
fn requested_phenotypes(catalogue: &Catalogue, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        catalogue.names()
    } else {
        requested.to_vec()
    }
}

pub fn run_extract(catalogue: &Catalogue, args: &ExtractArgs) -> Result<()> {
    let phenotypes = requested_phenotypes(catalogue, &args.phenotypes);
    let span = info_span!("extract", phenotypes = phenotypes.len());
    let _guard = span.enter();

    let options = ExtractOptions {
        fields: (!args.fields.is_empty()).then(|| args.fields.clone()),
        refresh: args.refresh,
        testing: args.testing,
        overrides: Overrides {
            age_field: args.age_field,
            year_field: args.year_field,
        },
    };
    options.check_modes()?;
    let tables = FrameSource::from_csv_dir(&args.sources)
        .with_context(|| format!("load source tables from {}", args.sources.display()))?;

    let mut sqlite;
    let mut scratch;
    let store: &mut dyn EventStore = match (&args.db, args.testing) {
        (Some(path), _) => {
            sqlite = SqliteEventStore::open(path)
                .with_context(|| format!("open event database {}", path.display()))?;
            &mut sqlite
        }
        (None, true) => {
            scratch = MemoryEventStore::new();
            &mut scratch
        }
        (None, false) => bail!("--db is required unless --testing is set"),
    };

    let outcome = Extractor::new(catalogue, &tables, store)
        .extract(&phenotypes, &options)
        .context("extract phenotypes")?;

    let rows_to_stdout =
        matches!(outcome, ExtractOutcome::Collected { .. }) && args.output.is_none();
    if let ExtractOutcome::Collected { events, .. } = &outcome {
        for event in events {
            trace!(
                eid = redact_value(&event.eid.to_string()),
                phenotype = %event.phenotype,
                field_id = %event.field_id,
                "collected row"
            );
        }
        let writer = open_output(args.output.as_deref()).context("open output")?;
        write_events_csv(events, writer).context("write collected rows")?;
    }
    print_extract_summary(&outcome, rows_to_stdout);
    Ok(())
}

pub fn run_list(catalogue: &Catalogue, args: &ListArgs) -> Result<()> {
    let query = PhenotypeQuery {
        include_cancer: !args.exclude_cancer,
        include_neonatal: !args.exclude_neonatal,
        include_elixhauser: args.include_elixhauser,
        include_complex: args.include_complex,
    };
    let mut summaries = catalogue
        .get_all_phenotypes(query)
        .context("list phenotypes")?;
    if let Some(category) = &args.category {
        summaries.retain(|summary| summary.group.as_deref() == Some(category.as_str()));
    }
    println!("{}", phenotype_table(&summaries));
    println!("{} phenotype(s)", summaries.len());
    Ok(())
}

pub fn run_categories(catalogue: &Catalogue) -> Result<()> {
    let categories: Vec<(String, usize)> = catalogue
        .get_categories()
        .into_iter()
        .map(|category| {
            let count = catalogue.get_phenotypes_by_category(&category).len();
            (category, count)
        })
        .collect();
    println!("{}", category_table(&categories));
    Ok(())
}

pub fn run_show(catalogue: &Catalogue, name: &str) -> Result<()> {
    let summary = catalogue
        .get_phenotype(name)
        .with_context(|| format!("show phenotype {name}"))?;
    println!("{}", detail_table(&summary));
    Ok(())
}

pub fn run_init_db(path: &Path) -> Result<()> {
    let store = SqliteEventStore::open(path)
        .with_context(|| format!("open event database {}", path.display()))?;
    store.install_schema().context("install event table")?;
    println!("Event table ready in {}", path.display());
    Ok(())
}

pub fn run_first_events(args: &FirstEventsArgs) -> Result<()> {
    let store = SqliteEventStore::open(&args.db)
        .with_context(|| format!("open event database {}", args.db.display()))?;
    let mut filter = Vec::new();
    if !args.phenotypes.is_empty() {
        filter.push(Predicate::in_list(
            EventColumn::Phenotype.name(),
            args.phenotypes.iter().map(String::as_str),
        ));
    }
    let events = store.events(&filter).context("read events")?;

    let births = match &args.sources {
        Some(dir) => {
            let tables = FrameSource::from_csv_dir(dir)
                .with_context(|| format!("load source tables from {}", dir.display()))?;
            birth_dates(&tables).context("derive birth dates")?
        }
        None => HashMap::new(),
    };

    let mut rows = first_events(&events, &births);
    if args.per_phenotype {
        rows = earliest_per_phenotype(&rows);
    }
    info!(events = events.len(), rows = rows.len(), "first events");
    let writer = open_output(args.output.as_deref()).context("open output")?;
    write_first_events_csv(&rows, writer).context("write first events")?;
    Ok(())
}
