use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use redb_containers::{Config, Connection, KeyValueTable, TransactionMode};

fn open_table(dir: &tempfile::TempDir) -> KeyValueTable<u64, String> {
    let config = Config::builder()
        .pathname(dir.path().join("bench.redb").to_string_lossy())
        .sync_durable(false)
        .build();
    let conn = Connection::create(config).unwrap();
    KeyValueTable::new(&conn, "articles").unwrap()
}

fn fill(table: &KeyValueTable<u64, String>, size: u64) {
    let mut txn = table
        .connection()
        .transaction(TransactionMode::Writable)
        .unwrap();
    for i in 0..size {
        table.insert_or_assign(&i, &format!("Article {}", i)).unwrap();
    }
    txn.commit().unwrap();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_insert");

    for size in [100u64, 1000, 5000].iter() {
        group.bench_with_input(BenchmarkId::new("one_transaction", size), size, |b, &size| {
            b.iter(|| {
                let temp_dir = tempfile::TempDir::new().unwrap();
                let table = open_table(&temp_dir);
                fill(&table, size);
                black_box(table.count().unwrap());
            });
        });
    }

    group.bench_function("scoped_per_call", |b| {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let table = open_table(&temp_dir);
        let mut i = 0u64;
        b.iter(|| {
            table.insert_or_assign(&i, &"Article".to_string()).unwrap();
            i += 1;
        });
    });

    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_find");

    for size in [100u64, 1000, 5000].iter() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let table = open_table(&temp_dir);
        fill(&table, *size);

        group.bench_with_input(BenchmarkId::new("shared_read", size), size, |b, &size| {
            b.iter(|| {
                let mut txn = table
                    .connection()
                    .transaction(TransactionMode::ReadOnly)
                    .unwrap();
                for i in 0..size {
                    black_box(table.find(&i).unwrap());
                }
                txn.commit().unwrap();
            });
        });
    }

    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_reconcile");

    for size in [100u64, 1000].iter() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let table = open_table(&temp_dir);
        fill(&table, *size);
        let wanted: Vec<(u64, String)> = (size / 2..size + size / 2)
            .map(|i| (i, format!("Article {}", i)))
            .collect();

        group.bench_with_input(BenchmarkId::new("half_overlap", size), size, |b, _| {
            b.iter(|| {
                table
                    .reconcile(wanted.iter().map(|(k, v)| (k, v)))
                    .unwrap();
                black_box(table.count().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_find, bench_reconcile);
criterion_main!(benches);
