//! Lote de inserción con reglas de unicidad simple y compuesta: fallo
//! parcial, agrupación en el resumen y escritura sólo de filas limpias.

use proc_domain::{summarize_batch, InMemoryRecordSource, Record, RecordSource, Status, UniqueKeyCheck};
use serde_json::json;

fn rec(uuid: &str, sku: &str, store: i64) -> Record {
    Record::new().with_value("uuid", json!(uuid))
                 .with_value("sku", json!(sku))
                 .with_value("storeId", json!(store))
}

#[test]
fn bulk_batch_partial_failure_summary() {
    let source = InMemoryRecordSource::new();
    // Filas pre-existentes: un uuid ya tomado y dos combinaciones sku+storeId.
    source.seed(vec![rec("u3", "Z-1", 99), rec("x-1", "S1", 1), rec("x-2", "S2", 2)]);

    let uuid_rule = UniqueKeyCheck::new(&["uuid"]);
    let compound_rule = UniqueKeyCheck::new(&["sku", "storeId"]);

    // Lote de 7: u3 choca contra una fila pre-existente, el segundo u2 choca
    // dentro del lote, u4/u5 chocan por la clave compuesta.
    let mut batch = vec![rec("u1", "A", 10),
                        rec("u2", "B", 10),
                        rec("u3", "C", 10),
                        rec("u4", "S1", 1),
                        rec("u5", "S2", 2),
                        rec("u2", "D", 10),
                        rec("u7", "E", 10)];

    uuid_rule.apply(&mut batch, &source).expect("uuid rule");
    compound_rule.apply(&mut batch, &source).expect("compound rule");

    let clean: Vec<Record> = batch.iter().filter(|r| !r.has_errors()).cloned().collect();
    assert_eq!(clean.len(), 3, "exactly three records survive validation");

    let lines = summarize_batch(&batch, "uuid", "record inserted");

    let uuid_line = lines.iter()
                         .find(|l| l.message == uuid_rule.message())
                         .expect("uuid error group");
    assert_eq!(uuid_line.status, Status::Error);
    assert_eq!(uuid_line.count, 2);
    assert_eq!(uuid_line.record_keys, vec!["u3", "u2"]);

    let compound_line = lines.iter()
                             .find(|l| l.message == compound_rule.message())
                             .expect("compound error group");
    assert_eq!(compound_line.status, Status::Error);
    assert_eq!(compound_line.count, 2);
    assert_eq!(compound_line.record_keys, vec!["u4", "u5"]);

    let ok_line = lines.iter().find(|l| l.status == Status::Ok).expect("ok group");
    assert_eq!(ok_line.count, 3);
    assert_eq!(ok_line.record_keys, vec!["u1", "u2", "u7"]);

    // Sólo las filas limpias llegan al source.
    source.insert(clean).expect("insert clean rows");
    assert_eq!(source.all().len(), 3 + 3);
}
