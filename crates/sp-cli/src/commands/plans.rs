//! `sp plans`: list, show, and delete saved timetables.

use std::io::Write;

use anyhow::{Result, bail};
use serde_json::json;
use sp_db::Database;

use crate::commands::plan::format_days;

/// Lists saved plans, newest first.
pub fn list<W: Write>(writer: &mut W, db: &Database, as_json: bool) -> Result<()> {
    let plans = db.list_timetables()?;

    if as_json {
        let items: Vec<_> = plans
            .iter()
            .map(|plan| {
                json!({
                    "id": plan.id,
                    "title": plan.title,
                    "variant": plan.variant,
                    "created_at": plan.created_at,
                })
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&items)?)?;
        return Ok(());
    }

    if plans.is_empty() {
        writeln!(writer, "No saved plans.")?;
        return Ok(());
    }

    for plan in plans {
        let title = plan
            .title
            .unwrap_or_else(|| format!("Timetable #{}", plan.id));
        writeln!(writer, "{:>4}  {}  {title}", plan.id, plan.created_at)?;
    }
    Ok(())
}

/// Prints one saved plan.
pub fn show<W: Write>(writer: &mut W, db: &Database, id: i64, as_json: bool) -> Result<()> {
    let Some(saved) = db.load_timetable(id)? else {
        bail!("plan not found: {id}");
    };

    if as_json {
        let value = json!({
            "timetable": saved.timetable,
            "title": saved.summary.title,
            "variant": saved.summary.variant,
            "created_at": saved.summary.created_at,
        });
        writeln!(writer, "{}", serde_json::to_string_pretty(&value)?)?;
        return Ok(());
    }

    let title = saved
        .summary
        .title
        .unwrap_or_else(|| format!("Timetable #{id}"));
    writeln!(writer, "{title} (saved {})", saved.summary.created_at)?;
    writeln!(writer)?;
    write!(writer, "{}", format_days(&saved.timetable))?;
    Ok(())
}

/// Deletes a saved plan.
pub fn delete<W: Write>(writer: &mut W, db: &mut Database, id: i64) -> Result<()> {
    if !db.delete_timetable(id)? {
        bail!("plan not found: {id}");
    }
    writeln!(writer, "Deleted plan {id}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use sp_core::{DailyAssignment, Timetable};

    fn seeded_db() -> (Database, i64) {
        let mut db = Database::open_in_memory().unwrap();
        let mut timetable = Timetable::new();
        timetable.insert(
            "2025-02-03".to_string(),
            vec![DailyAssignment {
                subject: "Chemistry".to_string(),
                hours: 2.5,
            }],
        );
        timetable.insert("2025-02-04".to_string(), vec![]);
        let id = db
            .save_timetable(Some("Midterms"), Some(9), &timetable)
            .unwrap();
        (db, id)
    }

    fn redact_timestamps(output: &str, db: &Database) -> String {
        db.list_timetables()
            .unwrap()
            .iter()
            .fold(output.to_string(), |acc, plan| {
                acc.replace(&plan.created_at, "[CREATED]")
            })
    }

    #[test]
    fn list_shows_titles() {
        let (db, _) = seeded_db();
        let mut output = Vec::new();

        list(&mut output, &db, false).unwrap();

        let output = redact_timestamps(&String::from_utf8(output).unwrap(), &db);
        assert_eq!(output, "   1  [CREATED]  Midterms\n");
    }

    #[test]
    fn list_empty() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        list(&mut output, &db, false).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "No saved plans.\n");
    }

    #[test]
    fn show_prints_days() {
        let (db, id) = seeded_db();
        let mut output = Vec::new();

        show(&mut output, &db, id, false).unwrap();

        let output = redact_timestamps(&String::from_utf8(output).unwrap(), &db);
        assert_snapshot!(output, @r"
        Midterms (saved [CREATED])

        2025-02-03 Mon  Chemistry 2.50h
        2025-02-04 Tue  -

        Totals:
          Chemistry    2.50h
        ");
    }

    #[test]
    fn show_json_includes_timetable() {
        let (db, id) = seeded_db();
        let mut output = Vec::new();

        show(&mut output, &db, id, true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["title"], "Midterms");
        assert_eq!(value["variant"], "9");
        assert_eq!(value["timetable"]["2025-02-03"][0]["hours"], 2.5);
    }

    #[test]
    fn delete_removes_plan_once() {
        let (mut db, id) = seeded_db();
        let mut output = Vec::new();

        delete(&mut output, &mut db, id).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), format!("Deleted plan {id}\n"));

        let err = delete(&mut Vec::<u8>::new(), &mut db, id).unwrap_err();
        assert_eq!(err.to_string(), format!("plan not found: {id}"));
        assert!(show(&mut Vec::<u8>::new(), &db, id, false).is_err());
    }
}
