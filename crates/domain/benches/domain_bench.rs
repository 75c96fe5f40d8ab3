use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Entity, Event, Password, Role, RoleUpdate, User, UserUpdate};

fn bench_role_lifecycle(c: &mut Criterion) {
    c.bench_function("domain/role_create_update_drain", |b| {
        b.iter(|| {
            let mut role = Role::create("bench", vec!["read".to_string()]);
            role.update(RoleUpdate {
                name: None,
                permissions: Some(vec!["read".to_string(), "write".to_string()]),
            });
            role.drain_events()
        });
    });
}

fn bench_user_update(c: &mut Criterion) {
    let mut user = User::create("bench", Password::new("pw"), "bench@domain.tld", vec![]);
    user.drain_events();

    c.bench_function("domain/user_update", |b| {
        b.iter(|| {
            user.update(UserUpdate {
                roles: Some(vec!["user".to_string()]),
                ..Default::default()
            });
            user.drain_events()
        });
    });
}

fn bench_event_codec(c: &mut Criterion) {
    let mut role = Role::create("bench", vec!["read".to_string()]);
    let event = role.drain_events().remove(0);

    c.bench_function("domain/event_encode_decode", |b| {
        b.iter(|| {
            let record = event.to_record().unwrap();
            Event::decode(event.channel(), record).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_role_lifecycle,
    bench_user_update,
    bench_event_codec
);
criterion_main!(benches);
