// Mirrors the DDL in `db::CREATE_SCHEMA`.

diesel::table! {
    readings (id) {
        id -> BigInt,
        sensor_id -> Nullable<BigInt>,
        timestamp -> BigInt,
        humidity -> Nullable<Double>,
        temperature -> Nullable<Double>,
        pressure -> Nullable<Double>,
        gas -> Nullable<Double>,
        color -> Nullable<BigInt>,
        alpha -> Nullable<BigInt>,
    }
}
