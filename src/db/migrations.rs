//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- CATALOG
        -- ============================================
        CREATE TABLE categorias (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE servicios (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Requesting users (doctors) and staff
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL,
            email TEXT UNIQUE,
            rol TEXT NOT NULL DEFAULT 'doctor'
                CHECK(rol IN ('admin', 'doctor', 'laboratorista', 'recepcionista')),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE examenes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            codigo TEXT NOT NULL UNIQUE,
            nombre TEXT NOT NULL,
            categoria_id INTEGER REFERENCES categorias(id) ON DELETE SET NULL,
            tipo TEXT NOT NULL DEFAULT 'simple' CHECK(tipo IN ('simple', 'compuesto', 'hibrido')),
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_examenes_categoria ON examenes(categoria_id);

        -- Named fields of compound exams (e.g. "Hemoglobina" in a hemogram)
        CREATE TABLE campos_examen (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            examen_id INTEGER NOT NULL REFERENCES examenes(id) ON DELETE CASCADE,
            nombre TEXT NOT NULL,
            unidad TEXT,
            valor_referencia TEXT,
            orden INTEGER NOT NULL DEFAULT 0,
            UNIQUE(examen_id, nombre)
        );

        CREATE INDEX idx_campos_examen_examen ON campos_examen(examen_id);

        -- ============================================
        -- PATIENTS
        -- ============================================
        CREATE TABLE pacientes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            codigo INTEGER UNIQUE,               -- assigned by trigger
            documento TEXT NOT NULL UNIQUE,
            nombres TEXT NOT NULL,
            apellidos TEXT,
            edad INTEGER CHECK(edad IS NULL OR edad >= 0),
            sexo TEXT CHECK(sexo IS NULL OR sexo IN ('M', 'F', 'O')),
            telefono TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_pacientes_nombres ON pacientes(nombres, apellidos);

        CREATE TRIGGER trg_pacientes_codigo
        AFTER INSERT ON pacientes
        FOR EACH ROW WHEN NEW.codigo IS NULL
        BEGIN
            UPDATE pacientes
            SET codigo = (SELECT COALESCE(MAX(codigo), 0) + 1 FROM pacientes)
            WHERE id = NEW.id;
        END;

        -- ============================================
        -- REQUESTS
        -- ============================================
        CREATE TABLE solicitudes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fecha TEXT NOT NULL,                 -- ISO date: "2025-01-09"
            numero_recibo TEXT NOT NULL UNIQUE,
            estado TEXT NOT NULL DEFAULT 'pendiente'
                CHECK(estado IN ('pendiente', 'en_proceso', 'completado')),
            servicio_id INTEGER REFERENCES servicios(id) ON DELETE SET NULL,
            paciente_id INTEGER NOT NULL REFERENCES pacientes(id) ON DELETE CASCADE,
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_solicitudes_fecha ON solicitudes(fecha);
        CREATE INDEX idx_solicitudes_paciente ON solicitudes(paciente_id);
        CREATE INDEX idx_solicitudes_user ON solicitudes(user_id);

        CREATE TABLE detallesolicitud (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            solicitud_id INTEGER NOT NULL REFERENCES solicitudes(id) ON DELETE CASCADE,
            examen_id INTEGER NOT NULL REFERENCES examenes(id) ON DELETE RESTRICT,
            estado TEXT NOT NULL DEFAULT 'pendiente'
                CHECK(estado IN ('pendiente', 'en_proceso', 'completado')),
            resultado TEXT,
            observaciones TEXT,
            fecha_realizacion TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(solicitud_id, examen_id)
        );

        CREATE INDEX idx_detallesolicitud_solicitud ON detallesolicitud(solicitud_id);
        CREATE INDEX idx_detallesolicitud_examen ON detallesolicitud(examen_id);
        CREATE INDEX idx_detallesolicitud_estado ON detallesolicitud(estado);

        -- ============================================
        -- RESULT VALUES (compound exams)
        -- ============================================
        CREATE TABLE valores_resultado (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            detalle_solicitud_id INTEGER NOT NULL REFERENCES detallesolicitud(id) ON DELETE CASCADE,
            campo_examen_id INTEGER NOT NULL REFERENCES campos_examen(id) ON DELETE CASCADE,
            valor TEXT NOT NULL,
            valor_referencia TEXT,               -- snapshot of the field's range at entry time
            fuera_rango INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(detalle_solicitud_id, campo_examen_id)
        );

        CREATE INDEX idx_valores_resultado_detalle ON valores_resultado(detalle_solicitud_id);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(needs_migration(&conn).unwrap());

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(!needs_migration(&conn).unwrap());
    }
}
