use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgcompose::{Eq, Param, VirtualTable, expr, insert_into, select, select_doc};

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("builders/select");

    for n in [1, 5, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut eq = Eq::new();
                for i in 0..n {
                    eq = eq.eq(format!("col{i}"), i as i64);
                }
                let q = select(["id", "name"])
                    .from("t")
                    .where_(eq)
                    .order_by("id")
                    .limit(10)
                    .to_sql();
                black_box(q)
            });
        });
    }

    group.finish();
}

fn bench_insert_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("builders/insert_rows");

    for n in [1, 10, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut ins = insert_into("t").columns(["a", "b", "c"]);
                for i in 0..n {
                    ins = ins.values(vec![
                        Param::new(i as i64),
                        Param::new("x"),
                        Param::new(true),
                    ]);
                }
                black_box(ins.on_conflict_column("a").set_excluded("b").to_sql())
            });
        });
    }

    group.finish();
}

fn bench_nested_documents(c: &mut Criterion) {
    let mut group = c.benchmark_group("builders/nested_documents");

    for depth in [1, 3, 6] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut doc = select_doc(["id"])
                    .from("leaf")
                    .where_(expr!("leaf.k = $1", 0_i64));
                for level in 1..depth {
                    doc = select_doc(["id"])
                        .many("children", doc)
                        .from(format!("level{level}"))
                        .where_(expr!("k = $1", level as i64));
                }
                black_box(doc.to_sql())
            });
        });
    }

    group.finish();
}

fn bench_virtual_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("builders/virtual_table");

    for n in [10, 100, 1000] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| black_box(VirtualTable::scalars(values).to_sql()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_select,
    bench_insert_rows,
    bench_nested_documents,
    bench_virtual_table
);
criterion_main!(benches);
