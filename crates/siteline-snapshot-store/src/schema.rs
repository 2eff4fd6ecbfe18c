//! Snapshot database schema, mirrored by the files under `migrations/`.

/// SQL to create the project snapshot table.
pub const CREATE_PROJECT_SNAPSHOT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS project_snapshot (
    identifier       UUID PRIMARY KEY,
    version          BIGINT NOT NULL,
    created_by       UUID NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL,
    last_modified_by UUID NOT NULL,
    last_modified_at TIMESTAMPTZ NOT NULL,
    title            VARCHAR(255) NOT NULL,
    start_date       DATE NOT NULL,
    end_date         DATE NOT NULL
);
";

/// SQL to create the task snapshot table.
pub const CREATE_TASK_SNAPSHOT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS task_snapshot (
    identifier       UUID PRIMARY KEY,
    version          BIGINT NOT NULL,
    created_by       UUID NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL,
    last_modified_by UUID NOT NULL,
    last_modified_at TIMESTAMPTZ NOT NULL,
    project_id       UUID NOT NULL,
    name             VARCHAR(255) NOT NULL,
    status           VARCHAR(32) NOT NULL,
    assignee         UUID
);

CREATE INDEX IF NOT EXISTS idx_task_snapshot_project_id
    ON task_snapshot (project_id);
";

/// SQL to create the participant snapshot table.
pub const CREATE_PARTICIPANT_SNAPSHOT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS participant_snapshot (
    identifier       UUID PRIMARY KEY,
    version          BIGINT NOT NULL,
    created_by       UUID NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL,
    last_modified_by UUID NOT NULL,
    last_modified_at TIMESTAMPTZ NOT NULL,
    project_id       UUID NOT NULL,
    user_id          UUID,
    email            VARCHAR(255),
    role             VARCHAR(32) NOT NULL,
    status           VARCHAR(32) NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_participant_snapshot_project_id
    ON participant_snapshot (project_id);
";

/// SQL to create the invitation snapshot table.
pub const CREATE_INVITATION_SNAPSHOT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS invitation_snapshot (
    identifier       UUID PRIMARY KEY,
    version          BIGINT NOT NULL,
    created_by       UUID NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL,
    last_modified_by UUID NOT NULL,
    last_modified_at TIMESTAMPTZ NOT NULL,
    project_id       UUID NOT NULL,
    participant_id   UUID NOT NULL,
    email            VARCHAR(255) NOT NULL,
    last_sent        TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_invitation_snapshot_project_id
    ON invitation_snapshot (project_id);
";

/// SQL to create the durable business transaction buffer.
pub const CREATE_TRANSACTION_EVENT_BUFFER_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS transaction_event_buffer (
    transaction_id UUID NOT NULL,
    event_offset   BIGINT NOT NULL,
    envelope       JSONB NOT NULL,
    inserted_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (transaction_id, event_offset)
);
";
