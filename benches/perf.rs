use criterion::{Criterion, black_box, criterion_group, criterion_main};
use dictum::{
    Backend, Catalog, DataDict, DictumError, Page, Secrets, SemanticType, Value, compile,
    execute,
};
use serde_json::json;

const DATA_DICT: &str = r#"
tables:
  - name: meter_readings_daily
    physical_name: ody_amr_daily_v3
    columns:
      - logical: timestamp
        physical: reading_ts
        role: { group_by: date }
      - logical: region
        physical: region
        role: { group_by: str }
      - logical: usage_sum
        physical: kwh_del
        role: additive
      - logical: meter_count
        physical: meter_cnt
        role: { count: preaggregated }
      - logical: acpu
        role: { ratio: { numerator: usage_sum, denominator: meter_count } }
      - logical: year_month
        role: { bucket: { source: timestamp, granularity: month } }
connections: []
"#;

const ROWS_PER_PAGE: usize = 1_000;
const PAGES: usize = 10;

fn bench_catalog() -> Catalog {
    let dict: DataDict = serde_yaml::from_str(DATA_DICT).expect("dict");
    Catalog::from_documents(
        dict,
        Secrets {
            username: "bench".into(),
            password: "bench".into(),
        },
    )
    .expect("catalog")
}

struct SyntheticBackend {
    pages_left: usize,
}

impl Backend for SyntheticBackend {
    fn submit(&mut self, _sql: &str) -> Result<Page, DictumError> {
        self.pages_left -= 1;
        Ok(self.page())
    }

    fn next_page(&mut self, _cursor: &str) -> Result<Page, DictumError> {
        self.pages_left -= 1;
        Ok(self.page())
    }

    fn coerce(
        &self,
        _column: &str,
        raw: &serde_json::Value,
        semantic: SemanticType,
    ) -> Result<Value, DictumError> {
        Ok(match semantic {
            SemanticType::Numeric => Value::Float(raw.as_f64().unwrap_or(0.0)),
            SemanticType::Integer => Value::Integer(raw.as_i64().unwrap_or(0)),
            _ => Value::Text(raw.as_str().unwrap_or("").into()),
        })
    }
}

impl SyntheticBackend {
    fn page(&self) -> Page {
        let rows = (0..ROWS_PER_PAGE)
            .map(|i| vec![json!(format!("R{}", i % 16)), json!(i as f64 * 1.5)])
            .collect();
        Page {
            columns: None,
            rows,
            cursor: if self.pages_left > 0 {
                Some("next".into())
            } else {
                None
            },
        }
    }
}

fn bench_compile(c: &mut Criterion) {
    let catalog = bench_catalog();
    let request: Vec<String> = ["year_month", "region", "acpu", "usage_sum"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    c.bench_function("compile_with_derived_metrics", |b| {
        b.iter(|| {
            compile(
                black_box(&catalog),
                "meter_readings_daily",
                black_box(&request),
                "timestamp >= '2023-01-01'",
            )
            .expect("compile")
        })
    });
}

fn bench_execute(c: &mut Criterion) {
    let catalog = bench_catalog();
    let request: Vec<String> = ["region", "usage_sum"].iter().map(|s| s.to_string()).collect();
    let compiled = compile(&catalog, "meter_readings_daily", &request, "").expect("compile");
    c.bench_function("execute_ten_pages", |b| {
        b.iter(|| {
            let mut backend = SyntheticBackend { pages_left: PAGES };
            execute(black_box(&mut backend), black_box(&compiled), None).expect("execute")
        })
    });
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
