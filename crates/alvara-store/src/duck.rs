//! DuckDB storage for processes, legislations, rules and PDF attachments.

use std::path::Path;

use alvara_core::{
    Attachment, AttachmentKind, AttachmentMeta, DomainError, Legislation, NewAttachment,
    NewLegislation, NewProcess, NewRule, Process, ProcessStatus, Rule,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use duckdb::{Connection, Row, params};
use tracing::info;

use crate::{CascadeSummary, LegislationStore, ProcessStore, StoreError};

/// Relational layout. DuckDB cannot cascade foreign keys, so ownership is
/// enforced by the store and cascading deletes run in one transaction.
/// Timestamps are RFC 3339 text.
const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS processos_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS legislacoes_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS regras_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS anexos_id_seq START 1;

CREATE TABLE IF NOT EXISTS processos (
    id                  BIGINT PRIMARY KEY,
    numero              VARCHAR NOT NULL UNIQUE,
    requerente          VARCHAR NOT NULL,
    responsavel_tecnico VARCHAR NOT NULL,
    analista            VARCHAR,
    uso                 VARCHAR NOT NULL,
    area_total          DOUBLE NOT NULL CHECK (area_total > 0),
    area_terreno        DOUBLE,
    altura              DOUBLE,
    pavimentos          DOUBLE,
    vagas               DOUBLE,
    recuo_frontal       DOUBLE,
    status              VARCHAR NOT NULL,
    data_protocolo      VARCHAR NOT NULL,
    data_cadastro       VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS legislacoes (
    id           BIGINT PRIMARY KEY,
    nome         VARCHAR NOT NULL UNIQUE,
    descricao    VARCHAR NOT NULL,
    uso          VARCHAR,
    data_criacao VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS regras (
    id               BIGINT PRIMARY KEY,
    legislacao_id    BIGINT NOT NULL,
    artigo           VARCHAR NOT NULL,
    descricao        VARCHAR NOT NULL,
    campo            VARCHAR NOT NULL,
    operador         VARCHAR NOT NULL,
    valor_referencia DOUBLE NOT NULL,
    mensagem_erro    VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS legislacao_pdfs (
    id            BIGINT PRIMARY KEY,
    legislacao_id BIGINT NOT NULL,
    nome_arquivo  VARCHAR NOT NULL,
    conteudo      BLOB NOT NULL,
    data_upload   VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS processo_pdfs (
    id             BIGINT PRIMARY KEY,
    processo_id    BIGINT NOT NULL,
    nome_arquivo   VARCHAR NOT NULL,
    tipo_documento VARCHAR NOT NULL,
    conteudo       BLOB NOT NULL,
    data_upload    VARCHAR NOT NULL
);
";

const TABLES: [&str; 5] = [
    "processos",
    "legislacoes",
    "regras",
    "legislacao_pdfs",
    "processo_pdfs",
];

const PROCESS_COLUMNS: &str = "id, numero, requerente, responsavel_tecnico, analista, uso, \
     area_total, area_terreno, altura, pavimentos, vagas, recuo_frontal, \
     status, data_protocolo, data_cadastro";

const LEGISLATION_COLUMNS: &str = "id, nome, descricao, uso, data_criacao";

const RULE_COLUMNS: &str = "r.id, r.legislacao_id, r.artigo, r.descricao, r.campo, r.operador, \
     r.valor_referencia, r.mensagem_erro";

/// DuckDB-backed store for the permitting workflow.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Both constructors create the schema if it does not exist yet.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        info!(path = %path.display(), "opened store");
        Ok(store)
    }

    /// Create sequences and tables. Idempotent.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ── Counts ──

    /// Row counts for every table, in schema order.
    pub fn table_counts(&self) -> Result<Vec<(&'static str, usize)>, StoreError> {
        TABLES
            .iter()
            .map(|t| Ok((*t, self.count_table(t)?)))
            .collect()
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT FROM {table}");
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn exists(&self, sql: &str, key: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(sql, [key], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn next_id(&self, sequence: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT nextval('{sequence}')");
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    // ── Arrow path ──

    /// Fetch a single process row as Arrow, for display.
    pub fn process_batch(&self, number: &str) -> Result<RecordBatch, StoreError> {
        let sql = format!("SELECT {PROCESS_COLUMNS} FROM processos WHERE numero = ?");
        let mut stmt = self.conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([number.trim()])?.collect();
        batches
            .into_iter()
            .find(|b| b.num_rows() > 0)
            .ok_or_else(|| StoreError::not_found("process", number.trim()))
    }

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }

    // ── Row helpers ──

    fn query_processes(&self, filter: &str, key: Option<&str>) -> Result<Vec<Process>, StoreError> {
        let sql = format!("SELECT {PROCESS_COLUMNS} FROM processos {filter} ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<ProcessRow> = match key {
            Some(k) => stmt.query_map([k], ProcessRow::read)?.collect::<Result<_, _>>()?,
            None => stmt.query_map([], ProcessRow::read)?.collect::<Result<_, _>>()?,
        };
        rows.into_iter().map(ProcessRow::into_process).collect()
    }

    fn query_legislations(&self, filter: &str, key: Option<&str>) -> Result<Vec<Legislation>, StoreError> {
        let sql = format!("SELECT {LEGISLATION_COLUMNS} FROM legislacoes {filter} ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<LegislationRow> = match key {
            Some(k) => stmt.query_map([k], LegislationRow::read)?.collect::<Result<_, _>>()?,
            None => stmt.query_map([], LegislationRow::read)?.collect::<Result<_, _>>()?,
        };
        rows.into_iter().map(LegislationRow::into_legislation).collect()
    }

    fn query_rules(&self, filter: &str, key: &str) -> Result<Vec<Rule>, StoreError> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM regras r JOIN legislacoes l ON l.id = r.legislacao_id \
             {filter} ORDER BY r.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<RuleRow> = stmt.query_map([key], RuleRow::read)?.collect::<Result<_, _>>()?;
        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    fn attachment_meta(&self, kind: AttachmentKind, owner_id: i64) -> Result<Vec<AttachmentMeta>, StoreError> {
        let sql = match kind {
            AttachmentKind::Legislation => {
                "SELECT id, legislacao_id, nome_arquivo, NULL::VARCHAR, octet_length(conteudo)::BIGINT, data_upload \
                 FROM legislacao_pdfs WHERE legislacao_id = ? ORDER BY id"
            }
            AttachmentKind::Project => {
                "SELECT id, processo_id, nome_arquivo, tipo_documento, octet_length(conteudo)::BIGINT, data_upload \
                 FROM processo_pdfs WHERE processo_id = ? ORDER BY id"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows: Vec<(i64, i64, String, Option<String>, i64, String)> = stmt
            .query_map([owner_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
            })?
            .collect::<Result<_, _>>()?;
        rows.into_iter()
            .map(|(id, owner_id, filename, doc_type, size, uploaded)| {
                Ok(AttachmentMeta {
                    id,
                    kind,
                    owner_id,
                    filename,
                    doc_type,
                    size: size as usize,
                    uploaded_at: parse_timestamp(&uploaded, "attachment")?,
                })
            })
            .collect()
    }

    fn attachment(&self, kind: AttachmentKind, id: i64) -> Result<Attachment, StoreError> {
        let sql = match kind {
            AttachmentKind::Legislation => {
                "SELECT id, legislacao_id, nome_arquivo, NULL::VARCHAR, conteudo, data_upload \
                 FROM legislacao_pdfs WHERE id = ?"
            }
            AttachmentKind::Project => {
                "SELECT id, processo_id, nome_arquivo, tipo_documento, conteudo, data_upload \
                 FROM processo_pdfs WHERE id = ?"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows: Vec<(i64, i64, String, Option<String>, Vec<u8>, String)> = stmt
            .query_map([id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
            })?
            .collect::<Result<_, _>>()?;
        let (id, owner_id, filename, doc_type, content, uploaded) = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("attachment", id))?;
        Ok(Attachment {
            id,
            kind,
            owner_id,
            filename,
            doc_type,
            uploaded_at: parse_timestamp(&uploaded, "attachment")?,
            content,
        })
    }

    fn insert_attachment(
        &self,
        kind: AttachmentKind,
        owner_id: i64,
        doc_type: Option<&str>,
        upload: NewAttachment,
    ) -> Result<AttachmentMeta, StoreError> {
        upload.validate()?;
        let id = self.next_id("anexos_id_seq")?;
        let uploaded_at = Utc::now();
        match kind {
            AttachmentKind::Project => {
                self.conn.execute(
                    "INSERT INTO processo_pdfs (id, processo_id, nome_arquivo, tipo_documento, conteudo, data_upload) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        id,
                        owner_id,
                        upload.filename,
                        doc_type.unwrap_or_default(),
                        upload.content,
                        uploaded_at.to_rfc3339(),
                    ],
                )?;
            }
            AttachmentKind::Legislation => {
                self.conn.execute(
                    "INSERT INTO legislacao_pdfs (id, legislacao_id, nome_arquivo, conteudo, data_upload) \
                     VALUES (?, ?, ?, ?, ?)",
                    params![id, owner_id, upload.filename, upload.content, uploaded_at.to_rfc3339()],
                )?;
            }
        }
        let meta = AttachmentMeta {
            id,
            kind,
            owner_id,
            filename: upload.filename,
            doc_type: doc_type.map(str::to_string),
            size: upload.content.len(),
            uploaded_at,
        };
        info!(id, %kind, owner_id, size = meta.size, "stored attachment");
        Ok(meta)
    }
}

impl ProcessStore for DuckStore {
    fn create_process(&mut self, submission: NewProcess) -> Result<Process, StoreError> {
        submission.validate()?;
        let number = submission.number.trim().to_string();
        if self.exists("SELECT count(*)::BIGINT FROM processos WHERE numero = ?", &number)? {
            return Err(StoreError::duplicate("process", number));
        }
        let id = self.next_id("processos_id_seq")?;
        let p = submission.into_process(id, Utc::now())?;
        self.conn.execute(
            &format!(
                "INSERT INTO processos ({PROCESS_COLUMNS}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                p.id,
                p.number,
                p.requester,
                p.technician,
                p.analyst,
                p.land_use,
                p.total_area,
                p.lot_area,
                p.height,
                p.floors,
                p.parking_spaces,
                p.front_setback,
                p.status.label(),
                p.protocol_at.to_rfc3339(),
                p.registered_at.to_rfc3339(),
            ],
        )?;
        info!(number = %p.number, id, "registered process");
        Ok(p)
    }

    fn process(&self, number: &str) -> Result<Process, StoreError> {
        let number = number.trim();
        self.query_processes("WHERE numero = ?", Some(number))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("process", number))
    }

    fn processes(&self) -> Result<Vec<Process>, StoreError> {
        self.query_processes("", None)
    }

    fn set_status(&mut self, number: &str, status: ProcessStatus) -> Result<Process, StoreError> {
        let before = self.process(number)?;
        self.conn.execute(
            "UPDATE processos SET status = ? WHERE id = ?",
            params![status.label(), before.id],
        )?;
        info!(number = %before.number, from = %before.status, to = %status, "status changed");
        Ok(Process { status, ..before })
    }

    fn assign_analyst(&mut self, number: &str, analyst: &str) -> Result<Process, StoreError> {
        let analyst = analyst.trim();
        if analyst.is_empty() {
            return Err(DomainError::Empty("analyst").into());
        }
        let before = self.process(number)?;
        self.conn.execute(
            "UPDATE processos SET analista = ? WHERE id = ?",
            params![analyst, before.id],
        )?;
        info!(number = %before.number, analyst, "analyst assigned");
        Ok(Process {
            analyst: Some(analyst.to_string()),
            ..before
        })
    }

    fn attach_project_pdf(
        &mut self,
        number: &str,
        doc_type: &str,
        upload: NewAttachment,
    ) -> Result<AttachmentMeta, StoreError> {
        let doc_type = doc_type.trim();
        if doc_type.is_empty() {
            return Err(DomainError::Empty("document type").into());
        }
        let owner = self.process(number)?.id;
        self.insert_attachment(AttachmentKind::Project, owner, Some(doc_type), upload)
    }

    fn project_pdfs(&self, number: &str) -> Result<Vec<AttachmentMeta>, StoreError> {
        let owner = self.process(number)?.id;
        self.attachment_meta(AttachmentKind::Project, owner)
    }

    fn project_pdf(&self, id: i64) -> Result<Attachment, StoreError> {
        self.attachment(AttachmentKind::Project, id)
    }
}

impl LegislationStore for DuckStore {
    fn create_legislation(&mut self, legislation: NewLegislation) -> Result<Legislation, StoreError> {
        legislation.validate()?;
        let name = legislation.name.trim().to_string();
        if self.exists("SELECT count(*)::BIGINT FROM legislacoes WHERE nome = ?", &name)? {
            return Err(StoreError::duplicate("legislation", name));
        }
        let id = self.next_id("legislacoes_id_seq")?;
        let l = legislation.into_legislation(id, Utc::now())?;
        self.conn.execute(
            &format!("INSERT INTO legislacoes ({LEGISLATION_COLUMNS}) VALUES (?, ?, ?, ?, ?)"),
            params![l.id, l.name, l.description, l.land_use, l.created_at.to_rfc3339()],
        )?;
        info!(name = %l.name, id, "registered legislation");
        Ok(l)
    }

    fn legislation(&self, name: &str) -> Result<Legislation, StoreError> {
        let name = name.trim();
        self.query_legislations("WHERE nome = ?", Some(name))?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("legislation", name))
    }

    fn legislations(&self) -> Result<Vec<Legislation>, StoreError> {
        self.query_legislations("", None)
    }

    fn delete_legislation(&mut self, name: &str) -> Result<CascadeSummary, StoreError> {
        let id = self.legislation(name)?.id;

        let tx = self.conn.transaction()?;
        let rules = tx.execute("DELETE FROM regras WHERE legislacao_id = ?", [id])?;
        let pdfs = tx.execute("DELETE FROM legislacao_pdfs WHERE legislacao_id = ?", [id])?;
        tx.execute("DELETE FROM legislacoes WHERE id = ?", [id])?;
        tx.commit()?;

        info!(name, rules, pdfs, "deleted legislation");
        Ok(CascadeSummary { rules, pdfs })
    }

    fn add_rule(&mut self, legislation: &str, rule: NewRule) -> Result<Rule, StoreError> {
        rule.validate()?;
        let legislation_id = self.legislation(legislation)?.id;
        let id = self.next_id("regras_id_seq")?;
        let r = rule.into_rule(id, legislation_id)?;
        self.conn.execute(
            "INSERT INTO regras (id, legislacao_id, artigo, descricao, campo, operador, valor_referencia, mensagem_erro) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                r.id,
                r.legislation_id,
                r.article,
                r.description,
                r.field.name(),
                r.operator.symbol(),
                r.reference,
                r.message,
            ],
        )?;
        info!(legislation, id, field = %r.field, op = %r.operator, "added rule");
        Ok(r)
    }

    fn rules(&self, legislation: &str) -> Result<Vec<Rule>, StoreError> {
        let name = self.legislation(legislation)?.name;
        self.query_rules("WHERE l.nome = ?", &name)
    }

    fn rules_for_land_use(&self, land_use: &str) -> Result<Vec<Rule>, StoreError> {
        self.query_rules(
            "WHERE l.uso IS NULL OR lower(trim(l.uso)) = lower(trim(?))",
            land_use,
        )
    }

    fn delete_rule(&mut self, id: i64) -> Result<(), StoreError> {
        let deleted = self.conn.execute("DELETE FROM regras WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(StoreError::not_found("rule", id));
        }
        info!(id, "deleted rule");
        Ok(())
    }

    fn attach_legislation_pdf(
        &mut self,
        legislation: &str,
        upload: NewAttachment,
    ) -> Result<AttachmentMeta, StoreError> {
        let owner = self.legislation(legislation)?.id;
        self.insert_attachment(AttachmentKind::Legislation, owner, None, upload)
    }

    fn legislation_pdfs(&self, legislation: &str) -> Result<Vec<AttachmentMeta>, StoreError> {
        let owner = self.legislation(legislation)?.id;
        self.attachment_meta(AttachmentKind::Legislation, owner)
    }

    fn legislation_pdf(&self, id: i64) -> Result<Attachment, StoreError> {
        self.attachment(AttachmentKind::Legislation, id)
    }
}

// ── Row mapping ──

fn parse_timestamp(raw: &str, entity: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            entity,
            detail: format!("bad timestamp {raw:?}: {e}"),
        })
}

fn corrupt(entity: &'static str) -> impl Fn(DomainError) -> StoreError {
    move |e| StoreError::Corrupt {
        entity,
        detail: e.to_string(),
    }
}

struct ProcessRow {
    id: i64,
    number: String,
    requester: String,
    technician: String,
    analyst: Option<String>,
    land_use: String,
    total_area: f64,
    lot_area: Option<f64>,
    height: Option<f64>,
    floors: Option<f64>,
    parking_spaces: Option<f64>,
    front_setback: Option<f64>,
    status: String,
    protocol_at: String,
    registered_at: String,
}

impl ProcessRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            number: row.get(1)?,
            requester: row.get(2)?,
            technician: row.get(3)?,
            analyst: row.get(4)?,
            land_use: row.get(5)?,
            total_area: row.get(6)?,
            lot_area: row.get(7)?,
            height: row.get(8)?,
            floors: row.get(9)?,
            parking_spaces: row.get(10)?,
            front_setback: row.get(11)?,
            status: row.get(12)?,
            protocol_at: row.get(13)?,
            registered_at: row.get(14)?,
        })
    }

    fn into_process(self) -> Result<Process, StoreError> {
        Ok(Process {
            id: self.id,
            number: self.number,
            requester: self.requester,
            technician: self.technician,
            analyst: self.analyst,
            land_use: self.land_use,
            total_area: self.total_area,
            lot_area: self.lot_area,
            height: self.height,
            floors: self.floors,
            parking_spaces: self.parking_spaces,
            front_setback: self.front_setback,
            status: self.status.parse().map_err(corrupt("process"))?,
            protocol_at: parse_timestamp(&self.protocol_at, "process")?,
            registered_at: parse_timestamp(&self.registered_at, "process")?,
        })
    }
}

struct LegislationRow {
    id: i64,
    name: String,
    description: String,
    land_use: Option<String>,
    created_at: String,
}

impl LegislationRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            land_use: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_legislation(self) -> Result<Legislation, StoreError> {
        Ok(Legislation {
            id: self.id,
            name: self.name,
            description: self.description,
            land_use: self.land_use,
            created_at: parse_timestamp(&self.created_at, "legislation")?,
        })
    }
}

struct RuleRow {
    id: i64,
    legislation_id: i64,
    article: String,
    description: String,
    field: String,
    operator: String,
    reference: f64,
    message: String,
}

impl RuleRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            legislation_id: row.get(1)?,
            article: row.get(2)?,
            description: row.get(3)?,
            field: row.get(4)?,
            operator: row.get(5)?,
            reference: row.get(6)?,
            message: row.get(7)?,
        })
    }

    /// A stored field or operator that no longer parses is corruption, not a
    /// configuration error: rules are validated before they are written.
    fn into_rule(self) -> Result<Rule, StoreError> {
        Ok(Rule {
            id: self.id,
            legislation_id: self.legislation_id,
            article: self.article,
            description: self.description,
            field: self.field.parse().map_err(corrupt("rule"))?,
            operator: self.operator.parse().map_err(corrupt("rule"))?,
            reference: self.reference,
            message: self.message,
        })
    }
}
