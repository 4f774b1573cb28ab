//! Sapphire II stream cipher.
//!
//! Michael Paul Johnson's public domain cipher, the one SWORD uses for locked
//! modules. The state is a 256 entry card permutation that is reshuffled for every
//! byte, with feedback from both the plain and the cipher stream, so one instance
//! must process a buffer from its start. A fresh instance is keyed per buffer.

pub struct Sapphire {
    cards: [u8; 256],
    rotor: u8,
    ratchet: u8,
    avalanche: u8,
    last_plain: u8,
    last_cipher: u8,
}

impl Sapphire {
    pub fn new(key: &[u8]) -> Self {
        let mut cipher = Sapphire {
            cards: [0; 256],
            rotor: 0,
            ratchet: 0,
            avalanche: 0,
            last_plain: 0,
            last_cipher: 0,
        };
        if key.is_empty() {
            cipher.hash_init();
        } else {
            cipher.initialize(key);
        }
        cipher
    }

    fn initialize(&mut self, key: &[u8]) {
        for (i, card) in self.cards.iter_mut().enumerate() {
            *card = i as u8;
        }

        let mut keypos = 0usize;
        let mut rsum = 0u8;
        for i in (0..=255usize).rev() {
            let toswap = self.keyrand(i, key, &mut keypos, &mut rsum);
            self.cards.swap(i, toswap);
        }

        self.rotor = self.cards[1];
        self.ratchet = self.cards[3];
        self.avalanche = self.cards[5];
        self.last_plain = self.cards[7];
        self.last_cipher = self.cards[rsum as usize];
    }

    fn hash_init(&mut self) {
        self.rotor = 1;
        self.ratchet = 3;
        self.avalanche = 5;
        self.last_plain = 7;
        self.last_cipher = 11;
        for (i, card) in self.cards.iter_mut().enumerate() {
            *card = 255 - i as u8;
        }
    }

    fn keyrand(&self, limit: usize, key: &[u8], keypos: &mut usize, rsum: &mut u8) -> usize {
        if limit == 0 {
            return 0;
        }

        let mut mask = 1usize;
        while mask < limit {
            mask = (mask << 1) + 1;
        }

        let mut retry_limiter = 0;
        loop {
            *rsum = self.cards[*rsum as usize].wrapping_add(key[*keypos]);
            *keypos += 1;
            if *keypos >= key.len() {
                *keypos = 0;
                // key "aaaa" != key "aaaaaaaa"
                *rsum = rsum.wrapping_add(key.len() as u8);
            }

            let mut u = mask & *rsum as usize;
            retry_limiter += 1;
            if retry_limiter > 11 {
                u %= limit;
            }
            if u <= limit {
                return u;
            }
        }
    }

    /// Advances the card state and returns the next keystream byte.
    fn next_keystream(&mut self) -> u8 {
        let c = &mut self.cards;
        self.ratchet = self.ratchet.wrapping_add(c[self.rotor as usize]);
        self.rotor = self.rotor.wrapping_add(1);

        let swaptemp = c[self.last_cipher as usize];
        c[self.last_cipher as usize] = c[self.ratchet as usize];
        c[self.ratchet as usize] = c[self.last_plain as usize];
        c[self.last_plain as usize] = c[self.rotor as usize];
        c[self.rotor as usize] = swaptemp;
        self.avalanche = self.avalanche.wrapping_add(c[swaptemp as usize]);

        let a = c[c[self.ratchet as usize].wrapping_add(c[self.rotor as usize]) as usize];
        let inner = c[self.last_plain as usize]
            .wrapping_add(c[self.last_cipher as usize])
            .wrapping_add(c[self.avalanche as usize]);
        a ^ c[c[inner as usize] as usize]
    }

    pub fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.next_keystream();
        self.last_plain = plain;
        self.last_cipher = cipher;
        cipher
    }

    pub fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.next_keystream();
        self.last_plain = plain;
        self.last_cipher = cipher;
        plain
    }
}
