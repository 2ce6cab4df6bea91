use capsula::prelude::*;

fn parse_row(row: &str) -> Result<(u64, [f64; 6]), Box<dyn std::error::Error>> {
    let mut fields = row.split(',');
    let id = fields.next().ok_or("empty row")?.parse()?;
    let mut values = [0.0; 6];
    for v in values.iter_mut() {
        *v = fields.next().ok_or("missing field")?.parse()?;
    }
    assert!(fields.next().is_none());
    Ok((id, values))
}

#[test]
fn exported_rows_match_population() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let exporter = CsvExporter::open_or_create(dir.path().join("run"))?;
    let mut setup = SimulationSetup::default();
    setup.n_initial = 5;
    let mut simulation = Simulation::new(&setup)?;

    let mut written = Vec::new();
    for _ in 0..3 {
        simulation.tick()?;
        let path = exporter.write_tick(simulation.n_ticks(), simulation.capsules())?;
        written.push((path.clone(), std::fs::read_to_string(&path)?));

        let content = &written.last().ok_or("nothing written")?.1;
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        let rows = lines
            .map(parse_row)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rows.len(), simulation.capsules().len());
        for ((id, values), capsule) in rows.iter().zip(simulation.capsules()) {
            assert_eq!(CapsuleId(*id), capsule.id());
            let [p1, p2] = capsule.endpoints();
            let expected = [p1.x, p1.y, p1.z, p2.x, p2.y, p2.z];
            assert_eq!(values, &expected);
        }
    }

    // Earlier ticks are never overwritten
    for (path, content) in written.iter() {
        assert_eq!(&std::fs::read_to_string(path)?, content);
    }
    let mut names: Vec<_> = std::fs::read_dir(&exporter.path)?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<Result<_, _>>()?;
    names.sort();
    assert_eq!(
        names,
        vec![
            "00000000000000000001.csv",
            "00000000000000000002.csv",
            "00000000000000000003.csv"
        ]
    );
    Ok(())
}
