use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use promisekit_orders::OrderForm;

fn valid_form() -> OrderForm {
    OrderForm {
        first_name: "John".into(),
        last_name: "Doe".into(),
        address1: "123 Main St".into(),
        address2: "Apt 5".into(),
        city: "San Francisco".into(),
        state: " ca ".into(),
        zip: "94102-1234".into(),
        phone: "(415) 555-1234".into(),
        email: " John@Example.COM ".into(),
        description: String::new(),
    }
}

fn invalid_form() -> OrderForm {
    OrderForm {
        state: "XX".into(),
        zip: "1234".into(),
        phone: "555-1234".into(),
        email: "invalid-email".into(),
        ..OrderForm::default()
    }
}

fn bench_normalize_and_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_and_validate");
    group.throughput(Throughput::Elements(1));

    group.bench_function("valid_form", |b| {
        b.iter(|| {
            let form = black_box(valid_form()).normalized();
            black_box(form.validate())
        })
    });

    group.bench_function("every_rule_violated", |b| {
        b.iter(|| {
            let form = black_box(invalid_form()).normalized();
            black_box(form.validate())
        })
    });

    group.finish();
}

fn bench_batch_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_validation");

    for batch_size in [10usize, 100, 1000].iter() {
        let forms: Vec<OrderForm> = (0..*batch_size)
            .map(|i| if i % 2 == 0 { valid_form() } else { invalid_form() })
            .collect();

        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &forms,
            |b, forms| {
                b.iter(|| {
                    forms
                        .iter()
                        .cloned()
                        .map(|f| f.normalized().validate().is_ok())
                        .filter(|ok| *ok)
                        .count()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_normalize_and_validate, bench_batch_validation);
criterion_main!(benches);
